//! The symbol table: every tag descriptor, kept sorted by start address.

use std::collections::HashMap;

use tracing::debug;

use tagdb_types::{Handle, TagIndex, TypeCode};

use crate::error::{StoreError, StoreResult};

/// A propagation rule owned by its source tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEntry {
    pub id: u32,
    pub source: Handle,
    pub destination: Handle,
    /// Bit-lane mask over the destination bytes, for lanes that do not start
    /// and end on byte boundaries.
    pub mask: Option<Vec<u8>>,
}

/// Values forced over a tag's stored bytes on client reads.
///
/// `data` and `mask` span the whole tag and are indexed from its first byte.
/// Where a mask bit is set, enabled reads return the bit from `data` instead
/// of the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Override {
    pub data: Vec<u8>,
    pub mask: Vec<u8>,
    pub active: bool,
}

impl Override {
    /// An empty, disabled override over `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0; len],
            mask: vec![0; len],
            active: false,
        }
    }

    /// Force the bits of `data` selected by `mask` at tag-relative `offset`.
    pub fn install(&mut self, offset: usize, data: &[u8], mask: &[u8]) {
        let range = offset..offset + data.len();
        for ((o, m), (d, new)) in self.data[range.clone()]
            .iter_mut()
            .zip(&mut self.mask[range])
            .zip(data.iter().zip(mask))
        {
            *o = (*o & !new) | (d & new);
            *m |= new;
        }
    }

    /// Release the bits selected by `mask` at tag-relative `offset`.
    pub fn release(&mut self, offset: usize, mask: &[u8]) {
        let range = offset..offset + mask.len();
        for ((o, m), clear) in self.data[range.clone()]
            .iter_mut()
            .zip(&mut self.mask[range])
            .zip(mask)
        {
            *o &= !clear;
            *m &= !clear;
        }
    }

    /// Returns `true` once no bit is forced.
    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|m| *m == 0)
    }

    /// Overlay the forced bits onto `bytes`, which start at tag-relative
    /// `offset`.
    pub fn apply(&self, offset: usize, bytes: &mut [u8]) {
        let end = offset + bytes.len();
        for ((b, d), m) in bytes
            .iter_mut()
            .zip(&self.data[offset..end])
            .zip(&self.mask[offset..end])
        {
            *b = (*b & !m) | (d & m);
        }
    }
}

/// What the allocator needs to know to place a new tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub type_code: TypeCode,
    pub count: u32,
    pub read_only: bool,
}

impl TagSpec {
    /// A writable tag of `count` elements.
    pub fn new(name: impl Into<String>, type_code: TypeCode, count: u32) -> Self {
        Self {
            name: name.into(),
            type_code,
            count,
            read_only: false,
        }
    }

    /// Mark the tag read-only to clients.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// One tag: its name, type, and the bit range it occupies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagDescriptor {
    pub index: TagIndex,
    pub name: String,
    pub type_code: TypeCode,
    pub count: u32,
    /// Absolute bit address of the first element.
    pub bit_address: u64,
    /// Width of one element in bits.
    pub elem_bits: u64,
    pub read_only: bool,
    pub mappings: Vec<MapEntry>,
    pub overrides: Option<Override>,
    next_map_id: u32,
}

impl TagDescriptor {
    /// Total width in bits.
    pub fn bits(&self) -> u64 {
        self.elem_bits * u64::from(self.count)
    }

    /// One past the last bit.
    pub fn end(&self) -> u64 {
        self.bit_address + self.bits()
    }

    /// Handle covering the whole tag.
    pub fn handle(&self) -> Handle {
        Handle::new(
            self.index,
            self.bit_address,
            self.type_code,
            self.count,
            self.elem_bits,
        )
    }

    /// Returns `true` if bytes `[start, start + len)` lie inside this tag's
    /// byte extent.
    pub fn contains_bytes(&self, start: u64, len: u64) -> bool {
        let tag = self.handle();
        start >= u64::from(tag.byte) && start.saturating_add(len) <= tag.end_byte()
    }

    /// Append a mapping and return its id. Ids are unique per tag.
    pub fn push_mapping(
        &mut self,
        source: Handle,
        destination: Handle,
        mask: Option<Vec<u8>>,
    ) -> u32 {
        let id = self.next_map_id;
        self.next_map_id += 1;
        self.mappings.push(MapEntry {
            id,
            source,
            destination,
            mask,
        });
        id
    }

    /// Remove the mapping with `id`.
    pub fn remove_mapping(&mut self, id: u32) -> Option<MapEntry> {
        let pos = self.mappings.iter().position(|m| m.id == id)?;
        Some(self.mappings.remove(pos))
    }

    /// Drop every mapping whose destination is `index`. Returns how many.
    pub fn drop_mappings_into(&mut self, index: TagIndex) -> usize {
        let before = self.mappings.len();
        self.mappings.retain(|m| m.destination.index != index);
        before - self.mappings.len()
    }
}

/// Tag descriptors sorted ascending by bit address, with no overlaps.
#[derive(Debug, Default)]
pub struct SymbolTable {
    tags: Vec<TagDescriptor>,
    names: HashMap<String, TagIndex>,
    addresses: HashMap<TagIndex, u64>,
    next_index: TagIndex,
    last_index: Option<TagIndex>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if the table holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Index the next inserted tag will receive.
    pub fn next_index(&self) -> TagIndex {
        self.next_index
    }

    /// Index of the most recently inserted tag.
    pub fn last_index(&self) -> Option<TagIndex> {
        self.last_index
    }

    /// Returns `true` if a live tag is called `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Insert a tag at `bit_address`. The caller has validated name, type,
    /// and count; the table enforces unique names and non-overlapping ranges.
    pub fn insert(
        &mut self,
        spec: TagSpec,
        elem_bits: u64,
        bit_address: u64,
    ) -> StoreResult<TagIndex> {
        if self.contains_name(&spec.name) {
            return Err(StoreError::DuplicateName(spec.name));
        }
        let index = self.next_index();
        let desc = TagDescriptor {
            index,
            name: spec.name,
            type_code: spec.type_code,
            count: spec.count,
            bit_address,
            elem_bits,
            read_only: spec.read_only,
            mappings: Vec::new(),
            overrides: None,
            next_map_id: 0,
        };

        let pos = self.tags.partition_point(|t| t.bit_address < bit_address);
        let prev = pos.checked_sub(1).and_then(|p| self.tags.get(p));
        let clash = prev
            .filter(|p| p.end() > desc.bit_address)
            .or_else(|| self.tags.get(pos).filter(|n| desc.end() > n.bit_address));
        if let Some(other) = clash {
            return Err(StoreError::Overlap {
                name: desc.name,
                other: other.name.clone(),
            });
        }

        debug!(
            index = index.raw(),
            name = %desc.name,
            bit_address,
            bits = desc.bits(),
            "tag inserted"
        );
        self.names.insert(desc.name.clone(), index);
        self.addresses.insert(index, bit_address);
        self.tags.insert(pos, desc);
        self.next_index = index.next();
        self.last_index = Some(index);
        Ok(index)
    }

    /// Remove a tag, returning its descriptor.
    pub fn remove(&mut self, index: TagIndex) -> Option<TagDescriptor> {
        let pos = self.position(index)?;
        let desc = self.tags.remove(pos);
        self.names.remove(&desc.name);
        self.addresses.remove(&index);
        debug!(index = index.raw(), name = %desc.name, "tag removed");
        Some(desc)
    }

    fn position(&self, index: TagIndex) -> Option<usize> {
        let address = *self.addresses.get(&index)?;
        self.tags
            .binary_search_by_key(&address, |t| t.bit_address)
            .ok()
    }

    /// Descriptor of the live tag at `index`.
    pub fn get(&self, index: TagIndex) -> Option<&TagDescriptor> {
        self.position(index).map(|p| &self.tags[p])
    }

    /// Mutable descriptor of the live tag at `index`.
    pub fn get_mut(&mut self, index: TagIndex) -> Option<&mut TagDescriptor> {
        self.position(index).map(|p| &mut self.tags[p])
    }

    /// Descriptor of the tag called `name`.
    pub fn by_name(&self, name: &str) -> Option<&TagDescriptor> {
        self.names.get(name).and_then(|i| self.get(*i))
    }

    /// Descriptors in ascending address order.
    pub fn as_slice(&self) -> &[TagDescriptor] {
        &self.tags
    }

    /// Iterate descriptors in address order.
    pub fn iter(&self) -> impl Iterator<Item = &TagDescriptor> {
        self.tags.iter()
    }

    /// Iterate descriptors mutably in address order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TagDescriptor> {
        self.tags.iter_mut()
    }

    /// Number of mappings installed across all tags.
    pub fn mapping_count(&self) -> usize {
        self.tags.iter().map(|t| t.mappings.len()).sum()
    }
}
