//! First-fit placement of new tags.
//!
//! Candidate gaps are the spaces between consecutive tags in address order.
//! The space before the first tag is never searched: the first tag owns the
//! start of the store. When no gap fits, the tag goes after the last one and
//! the store grows if it must.

use tagdb_types::{align_up, validate_name, TagIndex, TypeError, TypeRegistry};

use crate::bitstore::BitStore;
use crate::error::{StoreError, StoreResult};
use crate::symbols::{SymbolTable, TagDescriptor, TagSpec};

/// Start address for a range of `bits` bits aligned to `align`, among tags
/// sorted by address.
pub fn find_slot(tags: &[TagDescriptor], bits: u64, align: u64) -> u64 {
    for pair in tags.windows(2) {
        let start = align_up(pair[0].end(), align);
        if start + bits <= pair[1].bit_address {
            return start;
        }
    }
    tags.last().map_or(0, |t| align_up(t.end(), align))
}

/// Places tags into a store, growing it as needed.
pub struct Allocator<'a> {
    pub store: &'a mut BitStore,
    pub table: &'a mut SymbolTable,
    pub registry: &'a TypeRegistry,
}

impl Allocator<'_> {
    /// Validate the new tag, pick a slot, and insert it.
    ///
    /// Nothing is mutated unless every check passes. If the store must grow
    /// and cannot, the error is returned and the table is unchanged.
    pub fn allocate(&mut self, spec: TagSpec) -> StoreResult<TagIndex> {
        validate_name(&spec.name)?;
        if spec.count == 0 {
            return Err(TypeError::ZeroCount.into());
        }
        if spec.type_code.is_queue() {
            return Err(StoreError::QueueUnsupported(spec.type_code));
        }
        let elem_bits = self.registry.bits(spec.type_code)?;
        if self.table.contains_name(&spec.name) {
            return Err(StoreError::DuplicateName(spec.name));
        }

        let align = if spec.type_code.is_bool() {
            1
        } else {
            self.registry.align_bits(spec.type_code)?
        };
        let bits = elem_bits
            .checked_mul(u64::from(spec.count))
            .ok_or_else(|| StoreError::Allocation {
                requested_words: u64::MAX,
                reason: format!("{} elements of {} bits", spec.count, elem_bits),
            })?;
        let start = find_slot(self.table.as_slice(), bits, align);
        let end = start.checked_add(bits).ok_or_else(|| StoreError::Allocation {
            requested_words: u64::MAX,
            reason: "address space exhausted".into(),
        })?;
        self.store.grow_to(end)?;
        self.table.insert(spec, elem_bits, start)
    }
}
