//! Growable, bit-addressable backing memory for all tag values.
//!
//! The store is a run of 32-bit words viewed as bytes. It only ever grows,
//! by whole increments, and growth never moves a logical offset, so every
//! handle issued stays valid for the life of the store.

use std::ops::Range;

use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// Width of one store word in bits.
pub const WORD_BITS: u64 = 32;

/// Width of one store word in bytes.
pub const WORD_BYTES: usize = 4;

/// Largest store whose byte offsets fit in a `u32`.
pub const MAX_WORDS: u32 = u32::MAX / WORD_BYTES as u32;

/// The backing word array.
#[derive(Debug)]
pub struct BitStore {
    bytes: Vec<u8>,
    grow_words: u32,
    max_words: u32,
}

impl BitStore {
    /// Create a zeroed store sized per `config`.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let mut store = Self {
            bytes: Vec::new(),
            grow_words: config.grow_words,
            max_words: config.limit(),
        };
        store.resize(config.initial_words)?;
        info!(
            words = config.initial_words,
            grow_words = config.grow_words,
            max_words = store.max_words,
            "tag store created"
        );
        Ok(store)
    }

    /// Current size in words.
    pub fn words(&self) -> u32 {
        (self.bytes.len() / WORD_BYTES) as u32
    }

    /// Current capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Current capacity in bits.
    pub fn capacity_bits(&self) -> u64 {
        self.capacity_bytes() * 8
    }

    /// Grow by one increment. Returns the new size in words.
    pub fn grow(&mut self) -> StoreResult<u32> {
        let target = u64::from(self.words()) + u64::from(self.grow_words);
        self.grow_words_to(target)
    }

    /// Grow by whole increments until at least `bits` bits are addressable.
    /// Returns the new size in words; a no-op when the store is big enough.
    pub fn grow_to(&mut self, bits: u64) -> StoreResult<u32> {
        if bits <= self.capacity_bits() {
            return Ok(self.words());
        }
        let needed = bits.div_ceil(WORD_BITS);
        let current = u64::from(self.words());
        let step = u64::from(self.grow_words);
        let mut target = current + (needed - current).div_ceil(step) * step;
        let limit = u64::from(self.max_words);
        if needed <= limit {
            // the last increment may be partial
            target = target.min(limit);
        }
        self.grow_words_to(target)
    }

    fn grow_words_to(&mut self, target: u64) -> StoreResult<u32> {
        let from = self.words();
        let words = u32::try_from(target)
            .ok()
            .filter(|w| *w <= self.max_words)
            .ok_or_else(|| StoreError::Allocation {
                requested_words: target,
                reason: format!("limit is {} words", self.max_words),
            })?;
        self.resize(words)?;
        info!(from, to = words, "tag store grown");
        Ok(words)
    }

    fn resize(&mut self, words: u32) -> StoreResult<()> {
        let len = words as usize * WORD_BYTES;
        self.bytes
            .try_reserve_exact(len.saturating_sub(self.bytes.len()))
            .map_err(|e| StoreError::Allocation {
                requested_words: u64::from(words),
                reason: e.to_string(),
            })?;
        self.bytes.resize(len, 0);
        Ok(())
    }

    /// Bounds-check `[offset, offset + len)` against the current capacity.
    pub fn check(&self, offset: u64, len: u64) -> StoreResult<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity_bytes() => Ok(offset as usize..end as usize),
            _ => Err(StoreError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity_bytes(),
            }),
        }
    }

    /// Borrow `len` bytes starting at byte `offset`.
    pub fn read(&self, offset: u64, len: u64) -> StoreResult<&[u8]> {
        let range = self.check(offset, len)?;
        Ok(&self.bytes[range])
    }

    /// Overwrite the bytes at `offset` with `data`.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> StoreResult<()> {
        let range = self.check(offset, data.len() as u64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Write only the bits of `data` that are set in `mask`.
    pub fn masked_write(&mut self, offset: u64, data: &[u8], mask: &[u8]) -> StoreResult<()> {
        if data.len() != mask.len() {
            return Err(StoreError::LengthMismatch {
                data: data.len(),
                mask: mask.len(),
            });
        }
        let range = self.check(offset, data.len() as u64)?;
        for ((byte, d), m) in self.bytes[range].iter_mut().zip(data).zip(mask) {
            *byte = (*byte & !m) | (d & m);
        }
        Ok(())
    }

    /// Zero `bits` bits starting at the absolute `bit_address`.
    pub fn clear_bits(&mut self, bit_address: u64, bits: u64) -> StoreResult<()> {
        let end = bit_address.checked_add(bits).unwrap_or(u64::MAX);
        self.check(bit_address / 8, end.div_ceil(8) - bit_address / 8)?;
        for bit in bit_address..end {
            self.bytes[(bit / 8) as usize] &= !(1 << (bit % 8));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn small() -> BitStore {
        BitStore::new(&StoreConfig {
            initial_words: 4,
            grow_words: 4,
            max_words: Some(16),
        })
        .unwrap()
    }

    #[test]
    fn new_store_is_zeroed() {
        let store = small();
        assert_eq!(store.words(), 4);
        assert_eq!(store.capacity_bits(), 128);
        assert!(store.read(0, 16).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn out_of_bounds_is_rejected_without_writing() {
        let mut store = small();
        let err = store.write(14, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            StoreError::OutOfBounds {
                offset: 14,
                len: 3,
                capacity: 16
            }
        );
        assert!(store.read(0, 16).unwrap().iter().all(|b| *b == 0));
        assert!(store.read(16, 1).is_err());
        assert!(store.read(u64::MAX, 2).is_err());
        assert!(store.read(16, 0).is_ok());
    }

    #[test]
    fn growth_preserves_data() {
        let mut store = small();
        store.write(12, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(store.grow().unwrap(), 8);
        assert_eq!(store.read(12, 4).unwrap(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(store.read(16, 16).unwrap(), &[0u8; 16]);
    }

    #[test]
    fn grow_to_rounds_to_increments() {
        let mut store = small();
        assert_eq!(store.grow_to(100).unwrap(), 4);
        assert_eq!(store.grow_to(129).unwrap(), 8);
        assert_eq!(store.grow_to(300).unwrap(), 12);
    }

    #[test]
    fn growth_stops_at_ceiling() {
        let mut store = small();
        assert!(matches!(
            store.grow_to(16 * 32 + 1),
            Err(StoreError::Allocation {
                requested_words: 20,
                ..
            })
        ));
        assert_eq!(store.words(), 4);
        assert_eq!(store.grow_to(16 * 32).unwrap(), 16);
        assert!(store.grow().is_err());
    }

    #[test]
    fn grow_to_takes_partial_increment_at_ceiling() {
        let mut store = BitStore::new(&StoreConfig {
            initial_words: 4,
            grow_words: 8,
            max_words: Some(10),
        })
        .unwrap();
        assert_eq!(store.grow_to(9 * 32).unwrap(), 10);
    }

    #[test]
    fn mask_length_must_match() {
        let mut store = small();
        assert_eq!(
            store.masked_write(0, &[1, 2], &[0xFF]),
            Err(StoreError::LengthMismatch { data: 2, mask: 1 })
        );
    }

    #[test]
    fn clear_bits_spans_bytes() {
        let mut store = small();
        store.write(0, &[0xFF, 0xFF, 0xFF]).unwrap();
        store.clear_bits(5, 12).unwrap();
        assert_eq!(store.read(0, 3).unwrap(), &[0b0001_1111, 0x00, 0b1111_1110]);
        assert!(store.clear_bits(120, 9).is_err());
    }

    proptest! {
        #[test]
        fn masked_write_leaves_unmasked_bits(
            before in prop::collection::vec(any::<u8>(), 16..=16),
            data in prop::collection::vec(any::<u8>(), 1..8),
            seed in prop::collection::vec(any::<u8>(), 8..=8),
            offset in 0u64..8,
        ) {
            let mask = &seed[..data.len()];
            let mut store = small();
            store.write(0, &before).unwrap();
            store.masked_write(offset, &data, mask).unwrap();

            let after = store.read(0, 16).unwrap();
            for (i, (a, b)) in after.iter().zip(&before).enumerate() {
                let rel = i as i64 - offset as i64;
                let m = if rel >= 0 && (rel as usize) < data.len() {
                    mask[rel as usize]
                } else {
                    0
                };
                prop_assert_eq!(a & !m, b & !m);
                if m != 0 {
                    prop_assert_eq!(a & m, data[rel as usize] & m);
                }
            }
        }
    }
}
