use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tagdb_store::MapEntry;
use tagdb_types::{Handle, TagIndex, TypeCode};

use crate::atomic::AtomicOp;
use crate::config::EngineConfig;
use crate::engine::{Engine, StoreStatus, TagAttributes};
use crate::error::EngineResult;

/// An [`Engine`] behind one coarse lock, cheap to clone across threads.
///
/// Every call holds the lock for its whole read, allocate, write, and
/// propagate sequence, so no caller ever sees a store mid-growth.
#[derive(Clone, Debug)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    /// Build a fresh engine from `config` and wrap it.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Ok(Self::from_engine(Engine::new(config)?))
    }

    /// Wrap an existing engine.
    pub fn from_engine(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Engine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`Engine::create_type`].
    pub fn create_type(&self, definition: &str) -> EngineResult<TypeCode> {
        self.lock().create_type(definition)
    }

    /// See [`Engine::add_tag`].
    pub fn add_tag(&self, name: &str, type_code: TypeCode, count: u32) -> EngineResult<Handle> {
        self.lock().add_tag(name, type_code, count)
    }

    /// See [`Engine::delete_tag`].
    pub fn delete_tag(&self, index: TagIndex) -> EngineResult<()> {
        self.lock().delete_tag(index)
    }

    /// Handle of the tag called `name`.
    pub fn tag_handle_by_name(&self, name: &str) -> EngineResult<Handle> {
        Ok(self.lock().tag_by_name(name)?.handle())
    }

    /// See [`Engine::read`].
    pub fn read(&self, handle: &Handle) -> EngineResult<Vec<u8>> {
        self.lock().read(handle)
    }

    /// See [`Engine::write`].
    pub fn write(&self, handle: &Handle, data: &[u8]) -> EngineResult<()> {
        self.lock().write(handle, data)
    }

    /// See [`Engine::masked_write`].
    pub fn masked_write(&self, handle: &Handle, data: &[u8], mask: &[u8]) -> EngineResult<()> {
        self.lock().masked_write(handle, data, mask)
    }

    /// See [`Engine::read_value`].
    pub fn read_value(&self, handle: &Handle) -> EngineResult<Vec<u8>> {
        self.lock().read_value(handle)
    }

    /// See [`Engine::write_typed`].
    pub fn write_typed(&self, handle: &Handle, data: &[u8]) -> EngineResult<()> {
        self.lock().write_typed(handle, data)
    }

    /// See [`Engine::add_mapping`].
    pub fn add_mapping(&self, source: &Handle, destination: &Handle) -> EngineResult<u32> {
        self.lock().add_mapping(source, destination)
    }

    /// See [`Engine::remove_mapping`].
    pub fn remove_mapping(&self, index: TagIndex, id: u32) -> EngineResult<()> {
        self.lock().remove_mapping(index, id)
    }

    /// Copies of the mappings whose source is tag `index`.
    pub fn mappings(&self, index: TagIndex) -> EngineResult<Vec<MapEntry>> {
        Ok(self.lock().mappings(index)?.to_vec())
    }

    /// See [`Engine::status`].
    pub fn status(&self) -> StoreStatus {
        self.lock().status()
    }

    /// See [`Engine::atomic_op`].
    pub fn atomic_op(
        &self,
        handle: &Handle,
        op: AtomicOp,
        operand: &[u8],
    ) -> EngineResult<Vec<u8>> {
        self.lock().atomic_op(handle, op, operand)
    }

    /// See [`Engine::add_override`].
    pub fn add_override(&self, handle: &Handle, data: &[u8], mask: &[u8]) -> EngineResult<()> {
        self.lock().add_override(handle, data, mask)
    }

    /// See [`Engine::remove_override`].
    pub fn remove_override(&self, handle: &Handle, mask: &[u8]) -> EngineResult<()> {
        self.lock().remove_override(handle, mask)
    }

    /// See [`Engine::get_override`].
    pub fn get_override(&self, handle: &Handle) -> EngineResult<(Vec<u8>, Vec<u8>)> {
        self.lock().get_override(handle)
    }

    /// See [`Engine::set_override`].
    pub fn set_override(&self, index: TagIndex, active: bool) -> EngineResult<()> {
        self.lock().set_override(index, active)
    }

    /// See [`Engine::attributes`].
    pub fn attributes(&self, index: TagIndex) -> EngineResult<TagAttributes> {
        self.lock().attributes(index)
    }

    /// See [`Engine::set_read_only`].
    pub fn set_read_only(&self, index: TagIndex, read_only: bool) -> EngineResult<()> {
        self.lock().set_read_only(index, read_only)
    }
}
