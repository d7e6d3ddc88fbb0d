//! Read overrides.
//!
//! An override forces chosen bits of a tag to fixed values on client reads
//! while the stored bytes keep receiving writes and replications. Installing
//! an override does not enable it; [`Engine::set_override`] switches it on.

use tracing::debug;

use tagdb_store::{Override, StoreError};
use tagdb_types::{Handle, TagIndex};

use crate::engine::{Engine, STATUS_TAG};
use crate::error::{EngineError, EngineResult};

impl Engine {
    /// Force the bits of `data` selected by `mask` over the bytes starting
    /// at `handle.byte`. Earlier forced bits outside `mask` are kept.
    pub fn add_override(&mut self, handle: &Handle, data: &[u8], mask: &[u8]) -> EngineResult<()> {
        let offset = self.override_offset(handle, data.len(), mask.len())?;
        let desc = self
            .table
            .get_mut(handle.index)
            .ok_or(EngineError::TagNotFound(handle.index))?;
        let tag_size = desc.handle().size as usize;
        desc.overrides
            .get_or_insert_with(|| Override::new(tag_size))
            .install(offset, data, mask);
        debug!(index = handle.index.raw(), offset, len = data.len(), "override installed");
        Ok(())
    }

    /// Release the forced bits selected by `mask`. Once no bit is forced the
    /// override is removed and disabled.
    pub fn remove_override(&mut self, handle: &Handle, mask: &[u8]) -> EngineResult<()> {
        let offset = self.override_offset(handle, mask.len(), mask.len())?;
        let desc = self
            .table
            .get_mut(handle.index)
            .ok_or(EngineError::TagNotFound(handle.index))?;
        let ovr = desc
            .overrides
            .as_mut()
            .ok_or_else(|| EngineError::NoOverride(desc.name.clone()))?;
        ovr.release(offset, mask);
        if ovr.is_empty() {
            desc.overrides = None;
            debug!(index = handle.index.raw(), "override removed");
        }
        Ok(())
    }

    /// Forced values and mask over the `handle.size` bytes at `handle.byte`.
    pub fn get_override(&self, handle: &Handle) -> EngineResult<(Vec<u8>, Vec<u8>)> {
        let len = handle.size as usize;
        let offset = self.override_offset(handle, len, len)?;
        let desc = self.tag_by_index(handle.index)?;
        let ovr = desc
            .overrides
            .as_ref()
            .ok_or_else(|| EngineError::NoOverride(desc.name.clone()))?;
        let range = offset..offset + len;
        Ok((ovr.data[range.clone()].to_vec(), ovr.mask[range].to_vec()))
    }

    /// Enable or disable the override on tag `index`. Enabling a tag with
    /// no override installed fails; disabling one is a no-op.
    pub fn set_override(&mut self, index: TagIndex, active: bool) -> EngineResult<()> {
        let desc = self
            .table
            .get_mut(index)
            .ok_or(EngineError::TagNotFound(index))?;
        match desc.overrides.as_mut() {
            Some(ovr) => ovr.active = active,
            None if active => return Err(EngineError::NoOverride(desc.name.clone())),
            None => {}
        }
        debug!(index = index.raw(), name = %desc.name, active, "override switched");
        Ok(())
    }

    /// Tag-relative byte offset of `handle`, once the lengths agree and the
    /// range fits the tag.
    fn override_offset(&self, handle: &Handle, data: usize, mask: usize) -> EngineResult<usize> {
        if handle.index == TagIndex::STATUS {
            return Err(EngineError::Reserved(STATUS_TAG.into()));
        }
        if data != mask {
            return Err(StoreError::LengthMismatch { data, mask }.into());
        }
        let desc = self.checked_tag(handle, data as u64)?;
        Ok((handle.byte - desc.handle().byte) as usize)
    }
}
