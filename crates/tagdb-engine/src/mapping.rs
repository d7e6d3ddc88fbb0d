//! Write propagation between tags.
//!
//! A mapping copies a source byte range into a destination range whenever a
//! committed write touches the source. Replicated writes can trigger further
//! mappings; a hop counter bounds the cascade so cycles terminate.

use std::collections::VecDeque;

use tracing::{debug, warn};

use tagdb_codec::{bit_mask, copy_bits};
use tagdb_store::MapEntry;
use tagdb_types::{span_bytes, Handle, TagIndex};

use crate::engine::{Engine, STATUS_TAG};
use crate::error::{EngineError, EngineResult};

/// Replications performed by the write currently being propagated, and the
/// tag whose write started it.
#[derive(Debug, Default)]
pub(crate) struct HopCounter {
    pub(crate) hops: u32,
    pub(crate) origin: Option<TagIndex>,
}

impl Engine {
    /// Install a mapping from `source` to `destination` and return its id.
    ///
    /// A mapping copies the source lane, clipped to the destination lane.
    /// Unless both lanes start and end on byte boundaries the copy goes
    /// through a bit mask over the destination, so bits owned by packed
    /// neighbours are never touched. Installing the same pair twice returns
    /// the existing id.
    pub fn add_mapping(&mut self, source: &Handle, destination: &Handle) -> EngineResult<u32> {
        if source.index == TagIndex::STATUS || destination.index == TagIndex::STATUS {
            return Err(EngineError::Reserved(STATUS_TAG.into()));
        }
        let source_name = self.checked_tag(source, u64::from(source.size))?.name.clone();
        self.writable_tag(destination, u64::from(destination.size))?;
        if source.size > destination.size {
            return Err(EngineError::MappingSize {
                source_size: source.size,
                destination_size: destination.size,
            });
        }

        let bits = lane_bits(source, destination);
        let aligned = source.bit == 0 && destination.bit == 0 && bits % 8 == 0;
        let mask = (!aligned).then(|| bit_mask(destination.bit, bits));
        if let Some(mask) = &mask {
            let span = span_bytes(source.bit, bits);
            if span > u64::from(source.size) {
                return Err(EngineError::HandleOutOfBounds {
                    name: source_name,
                    byte: u64::from(source.byte),
                    size: span,
                });
            }
            if mask.len() > destination.size as usize {
                return Err(EngineError::MappingSize {
                    source_size: mask.len() as u32,
                    destination_size: destination.size,
                });
            }
        }

        let tag = self
            .table
            .get_mut(source.index)
            .ok_or(EngineError::TagNotFound(source.index))?;
        if let Some(existing) = tag
            .mappings
            .iter()
            .find(|m| m.source == *source && m.destination == *destination)
        {
            warn!(
                tag = %tag.name,
                id = existing.id,
                "mapping already installed"
            );
            return Ok(existing.id);
        }
        let masked = mask.is_some();
        let id = tag.push_mapping(*source, *destination, mask);
        debug!(
            source = source.index.raw(),
            destination = destination.index.raw(),
            id,
            masked,
            "mapping added"
        );
        self.publish_status()?;
        Ok(id)
    }

    /// Remove mapping `id` from tag `index`.
    pub fn remove_mapping(&mut self, index: TagIndex, id: u32) -> EngineResult<()> {
        let tag = self
            .table
            .get_mut(index)
            .ok_or(EngineError::TagNotFound(index))?;
        tag.remove_mapping(id)
            .ok_or(EngineError::MappingNotFound { index, id })?;
        debug!(index = index.raw(), id, "mapping removed");
        self.publish_status()
    }

    /// Source and destination of mapping `id` on tag `index`.
    pub fn get_mapping(&self, index: TagIndex, id: u32) -> EngineResult<(Handle, Handle)> {
        self.tag_by_index(index)?
            .mappings
            .iter()
            .find(|m| m.id == id)
            .map(|m| (m.source, m.destination))
            .ok_or(EngineError::MappingNotFound { index, id })
    }

    /// All mappings whose source is tag `index`.
    pub fn mappings(&self, index: TagIndex) -> EngineResult<&[MapEntry]> {
        Ok(&self.tag_by_index(index)?.mappings)
    }

    /// Replay a committed write of `[offset, offset + len)` on tag `index`
    /// into every mapping it touches, and onward through their mappings.
    pub(crate) fn propagate(&mut self, index: TagIndex, offset: u64, len: u64) -> EngineResult<()> {
        self.hops = HopCounter {
            hops: 0,
            origin: Some(index),
        };
        let result = self.fan_out(index, offset, len);
        self.hops = HopCounter::default();
        result
    }

    fn fan_out(&mut self, index: TagIndex, offset: u64, len: u64) -> EngineResult<()> {
        let mut pending = VecDeque::from([(index, offset, len)]);
        while let Some((index, offset, len)) = pending.pop_front() {
            let hits: Vec<MapEntry> = match self.table.get(index) {
                Some(tag) => tag
                    .mappings
                    .iter()
                    .filter(|m| m.source.overlaps_bytes(offset, len))
                    .cloned()
                    .collect(),
                None => continue,
            };
            for entry in &hits {
                self.hops.hops += 1;
                if self.hops.hops > self.max_hops {
                    return Err(self.overflow());
                }
                pending.push_back(self.replicate(entry)?);
            }
        }
        Ok(())
    }

    /// Copy the source range of `entry` to its destination. Returns the
    /// destination write for further propagation.
    fn replicate(&mut self, entry: &MapEntry) -> EngineResult<(TagIndex, u64, u64)> {
        let src = &entry.source;
        let dst = &entry.destination;
        let bits = lane_bits(src, dst);
        let data = self
            .store
            .read(u64::from(src.byte), u64::from(src.size))?
            .to_vec();
        let offset = u64::from(dst.byte);
        match &entry.mask {
            Some(mask) => {
                let mut shadow = vec![0u8; mask.len()];
                copy_bits(&data, u64::from(src.bit), &mut shadow, u64::from(dst.bit), bits);
                self.store.masked_write(offset, &shadow, mask)?;
                Ok((dst.index, offset, mask.len() as u64))
            }
            None => {
                let whole = &data[..(bits / 8) as usize];
                self.store.write(offset, whole)?;
                Ok((dst.index, offset, whole.len() as u64))
            }
        }
    }

    fn overflow(&self) -> EngineError {
        let origin = self
            .hops
            .origin
            .and_then(|i| self.table.get(i))
            .map(|t| t.name.clone())
            .unwrap_or_default();
        warn!(origin = %origin, max_hops = self.max_hops, "propagation hop limit exceeded");
        EngineError::PropagationOverflow {
            origin,
            hops: self.max_hops,
        }
    }
}

/// Bits a mapping copies: the source lane clipped to the destination lane.
/// A boolean lane is `count` bits; any other lane is its whole byte size.
fn lane_bits(source: &Handle, destination: &Handle) -> u64 {
    let lane = |h: &Handle| {
        if h.type_code.is_bool() {
            u64::from(h.count)
        } else {
            u64::from(h.size) * 8
        }
    };
    lane(source).min(lane(destination))
}
