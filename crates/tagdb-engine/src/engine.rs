//! The tag engine: one store, its symbol table, its compound types, and the
//! write path that ties them together.

use tracing::{debug, info};

use tagdb_codec::{convert, read_typed, write_typed, ByteOrder, RawAccess};
use tagdb_store::{Allocator, BitStore, SymbolTable, TagDescriptor, TagSpec};
use tagdb_types::{Handle, Member, TagIndex, TypeCode, TypeRegistry};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::mapping::HopCounter;

/// Name of the reserved status tag at handle 0.
pub const STATUS_TAG: &str = "_status";

/// Number of UDINT words the status tag publishes.
pub const STATUS_WORDS: u32 = 4;

/// Snapshot of the values published in the status tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreStatus {
    /// Store capacity in 32-bit words.
    pub words: u32,
    /// Number of tags, the status tag included.
    pub tags: u32,
    /// Index of the most recently created tag.
    pub last_index: u32,
    /// Number of installed mappings.
    pub mappings: u32,
}

/// Client-visible state flags of one tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagAttributes {
    /// Clients may not write the tag.
    pub read_only: bool,
    /// The tag is the source of at least one mapping.
    pub mapped: bool,
    /// An override is installed.
    pub override_installed: bool,
    /// The installed override is applied to reads.
    pub override_active: bool,
}

impl StoreStatus {
    fn to_words(self) -> [u32; STATUS_WORDS as usize] {
        [self.words, self.tags, self.last_index, self.mappings]
    }
}

/// A tag database instance.
///
/// Every method runs to completion synchronously. Share an engine across
/// threads with [`SharedEngine`](crate::SharedEngine).
#[derive(Debug)]
pub struct Engine {
    pub(crate) store: BitStore,
    pub(crate) table: SymbolTable,
    pub(crate) registry: TypeRegistry,
    pub(crate) byte_order: ByteOrder,
    pub(crate) max_hops: u32,
    pub(crate) hops: HopCounter,
}

impl Engine {
    /// Create an engine with an empty store holding only the status tag.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let mut engine = Self {
            store: BitStore::new(&config.store)?,
            table: SymbolTable::new(),
            registry: TypeRegistry::new(),
            byte_order: config.byte_order,
            max_hops: config.max_hops,
            hops: HopCounter::default(),
        };
        let spec = TagSpec::new(STATUS_TAG, TypeCode::UDINT, STATUS_WORDS).read_only();
        engine.allocator().allocate(spec)?;
        engine.publish_status()?;
        info!(
            words = engine.store.words(),
            max_hops = engine.max_hops,
            byte_order = ?engine.byte_order,
            "tag engine ready"
        );
        Ok(engine)
    }

    fn allocator(&mut self) -> Allocator<'_> {
        Allocator {
            store: &mut self.store,
            table: &mut self.table,
            registry: &self.registry,
        }
    }

    // -- compound types --

    /// Register a compound type from `Name:member,TYPE,count:...`.
    pub fn create_type(&mut self, definition: &str) -> EngineResult<TypeCode> {
        let code = self.registry.create_from_definition(definition)?;
        debug!(code = %code, definition, "compound type registered");
        Ok(code)
    }

    /// Register a compound type from a member list.
    pub fn create_compound(&mut self, name: &str, members: Vec<Member>) -> EngineResult<TypeCode> {
        let code = self.registry.create(name, members)?;
        debug!(code = %code, name, "compound type registered");
        Ok(code)
    }

    /// Resolve a primitive or compound type name, case-insensitively.
    pub fn type_by_name(&self, name: &str) -> EngineResult<TypeCode> {
        Ok(self.registry.by_name(name)?)
    }

    /// Canonical name of a primitive or registered compound type.
    pub fn type_name(&self, code: TypeCode) -> EngineResult<String> {
        Ok(self.registry.name_of(code)?)
    }

    /// Canonical definition string of a compound type.
    pub fn serialize_type(&self, code: TypeCode) -> EngineResult<String> {
        Ok(self.registry.serialize(code)?)
    }

    /// The compound types registered so far.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // -- tag lifecycle --

    /// Create a tag and return a handle covering all of it.
    pub fn add_tag(&mut self, name: &str, type_code: TypeCode, count: u32) -> EngineResult<Handle> {
        let index = self
            .allocator()
            .allocate(TagSpec::new(name, type_code, count))?;
        self.registry.retain(type_code);
        self.publish_status()?;
        let handle = self.tag_handle(index)?;
        debug!(
            index = index.raw(),
            name,
            type_code = %type_code,
            count,
            byte = handle.byte,
            bit = handle.bit,
            "tag added"
        );
        Ok(handle)
    }

    /// Delete a tag, zero its bits, and drop every mapping into or out of it.
    pub fn delete_tag(&mut self, index: TagIndex) -> EngineResult<()> {
        if index == TagIndex::STATUS {
            return Err(EngineError::Reserved(STATUS_TAG.into()));
        }
        let desc = self
            .table
            .remove(index)
            .ok_or(EngineError::TagNotFound(index))?;
        self.store.clear_bits(desc.bit_address, desc.bits())?;
        let orphaned: usize = self
            .table
            .iter_mut()
            .map(|t| t.drop_mappings_into(index))
            .sum();
        self.registry.release(desc.type_code);
        self.publish_status()?;
        debug!(
            index = index.raw(),
            name = %desc.name,
            mappings = desc.mappings.len(),
            orphaned,
            "tag deleted"
        );
        Ok(())
    }

    /// Descriptor of the live tag at `index`.
    pub fn tag_by_index(&self, index: TagIndex) -> EngineResult<&TagDescriptor> {
        self.table.get(index).ok_or(EngineError::TagNotFound(index))
    }

    /// Descriptor of the tag called `name`. Names are case-sensitive.
    pub fn tag_by_name(&self, name: &str) -> EngineResult<&TagDescriptor> {
        self.table
            .by_name(name)
            .ok_or_else(|| EngineError::TagNameNotFound(name.to_string()))
    }

    /// All tags in address order, the status tag first.
    pub fn tags(&self) -> impl Iterator<Item = &TagDescriptor> {
        self.table.iter()
    }

    /// Handle covering a whole tag.
    pub fn tag_handle(&self, index: TagIndex) -> EngineResult<Handle> {
        Ok(self.tag_by_index(index)?.handle())
    }

    /// Handle covering elements `first..first + count` of a tag.
    pub fn element_handle(&self, index: TagIndex, first: u32, count: u32) -> EngineResult<Handle> {
        let desc = self.tag_by_index(index)?;
        Ok(desc.handle().subrange(first, count, desc.elem_bits)?)
    }

    /// State flags of the tag at `index`.
    pub fn attributes(&self, index: TagIndex) -> EngineResult<TagAttributes> {
        let desc = self.tag_by_index(index)?;
        Ok(TagAttributes {
            read_only: desc.read_only,
            mapped: !desc.mappings.is_empty(),
            override_installed: desc.overrides.is_some(),
            override_active: desc.overrides.as_ref().is_some_and(|o| o.active),
        })
    }

    /// Allow or forbid client writes to a tag. Mapping destinations stay
    /// installed; replication into a read-only tag continues.
    pub fn set_read_only(&mut self, index: TagIndex, read_only: bool) -> EngineResult<()> {
        if index == TagIndex::STATUS {
            return Err(EngineError::Reserved(STATUS_TAG.into()));
        }
        let desc = self
            .table
            .get_mut(index)
            .ok_or(EngineError::TagNotFound(index))?;
        desc.read_only = read_only;
        debug!(index = index.raw(), name = %desc.name, read_only, "tag attribute changed");
        Ok(())
    }

    // -- raw access --

    /// The tag `handle` names, if `[byte, byte + len)` lies inside it.
    pub(crate) fn checked_tag(&self, handle: &Handle, len: u64) -> EngineResult<&TagDescriptor> {
        let desc = self.tag_by_index(handle.index)?;
        let start = u64::from(handle.byte);
        if !desc.contains_bytes(start, len) {
            return Err(EngineError::HandleOutOfBounds {
                name: desc.name.clone(),
                byte: start,
                size: len,
            });
        }
        Ok(desc)
    }

    pub(crate) fn writable_tag(&self, handle: &Handle, len: u64) -> EngineResult<()> {
        let desc = self.checked_tag(handle, len)?;
        if desc.read_only {
            return Err(EngineError::ReadOnly(desc.name.clone()));
        }
        Ok(())
    }

    /// Read the `handle.size` bytes the handle covers, with any enabled
    /// override applied.
    pub fn read(&self, handle: &Handle) -> EngineResult<Vec<u8>> {
        let desc = self.checked_tag(handle, u64::from(handle.size))?;
        let mut bytes = self
            .store
            .read(u64::from(handle.byte), u64::from(handle.size))?
            .to_vec();
        if let Some(ovr) = desc.overrides.as_ref().filter(|o| o.active) {
            let offset = (handle.byte - desc.handle().byte) as usize;
            ovr.apply(offset, &mut bytes);
        }
        Ok(bytes)
    }

    /// Read the stored bytes behind `handle`, ignoring overrides.
    pub(crate) fn read_stored(&self, handle: &Handle) -> EngineResult<Vec<u8>> {
        self.checked_tag(handle, u64::from(handle.size))?;
        Ok(self
            .store
            .read(u64::from(handle.byte), u64::from(handle.size))?
            .to_vec())
    }

    /// Write `data` at `handle.byte`, then propagate to mapped tags.
    ///
    /// On [`EngineError::PropagationOverflow`] the write itself has been
    /// applied; only the cascade was cut short.
    pub fn write(&mut self, handle: &Handle, data: &[u8]) -> EngineResult<()> {
        let len = data.len() as u64;
        self.writable_tag(handle, len)?;
        self.store.write(u64::from(handle.byte), data)?;
        self.propagate(handle.index, u64::from(handle.byte), len)
    }

    /// Write the bits of `data` selected by `mask`, then propagate.
    pub fn masked_write(&mut self, handle: &Handle, data: &[u8], mask: &[u8]) -> EngineResult<()> {
        let len = data.len() as u64;
        self.writable_tag(handle, len)?;
        self.store.masked_write(u64::from(handle.byte), data, mask)?;
        self.propagate(handle.index, u64::from(handle.byte), len)
    }

    /// Read the value behind `handle` into `out`, converted to native order.
    /// Returns the number of bytes filled.
    pub fn read_typed(&self, handle: &Handle, out: &mut [u8]) -> EngineResult<usize> {
        read_typed(self, handle, out)
    }

    /// Read the value behind `handle` into a new buffer.
    pub fn read_value(&self, handle: &Handle) -> EngineResult<Vec<u8>> {
        let mut out = vec![0u8; tagdb_codec::value_len(&self.registry, handle)?];
        read_typed(self, handle, &mut out)?;
        Ok(out)
    }

    /// Write the native value in `data` to the range behind `handle`.
    pub fn write_typed(&mut self, handle: &Handle, data: &[u8]) -> EngineResult<()> {
        write_typed(self, handle, data)
    }

    // -- store --

    /// Grow the store by one increment. Returns the new size in words.
    pub fn grow(&mut self) -> EngineResult<u32> {
        let words = self.store.grow()?;
        self.publish_status()?;
        Ok(words)
    }

    /// Current values of the status tag.
    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            words: self.store.words(),
            tags: self.table.len() as u32,
            last_index: self.table.last_index().map_or(0, |i| i.raw() as u32),
            mappings: self.table.mapping_count() as u32,
        }
    }

    /// Byte order of multi-byte values inside the store.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Refresh the status tag. Writes straight to the store, bypassing the
    /// read-only check and propagation.
    pub(crate) fn publish_status(&mut self) -> EngineResult<()> {
        let mut bytes: Vec<u8> = self
            .status()
            .to_words()
            .iter()
            .flat_map(|w| w.to_ne_bytes())
            .collect();
        convert(
            &self.registry,
            TypeCode::UDINT,
            STATUS_WORDS,
            &mut bytes,
            self.byte_order,
        )?;
        self.store.write(0, &bytes)?;
        Ok(())
    }
}

impl RawAccess for Engine {
    type Error = EngineError;

    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn read_raw(&self, handle: &Handle) -> EngineResult<Vec<u8>> {
        self.read(handle)
    }

    fn write_raw(&mut self, handle: &Handle, data: &[u8]) -> EngineResult<()> {
        self.write(handle, data)
    }

    fn masked_write_raw(&mut self, handle: &Handle, data: &[u8], mask: &[u8]) -> EngineResult<()> {
        self.masked_write(handle, data, mask)
    }
}
