//! Bit-level helpers for boolean ranges. Bit 0 is the least significant bit
//! of a byte.

pub use tagdb_types::span_bytes;

/// Copy `count` bits from `src` starting at bit `src_bit` into `dst` starting
/// at bit `dst_bit`. Bits of `dst` outside the target range are untouched.
///
/// Both slices must be long enough to hold their ranges.
pub fn copy_bits(src: &[u8], src_bit: u64, dst: &mut [u8], dst_bit: u64, count: u64) {
    for i in 0..count {
        let s = src_bit + i;
        let d = dst_bit + i;
        let set = src[(s / 8) as usize] & (1 << (s % 8)) != 0;
        let byte = &mut dst[(d / 8) as usize];
        if set {
            *byte |= 1 << (d % 8);
        } else {
            *byte &= !(1 << (d % 8));
        }
    }
}

/// A mask selecting `count` bits starting at `bit`, sized to the bytes the
/// range touches.
pub fn bit_mask(bit: u8, count: u64) -> Vec<u8> {
    let mut mask = vec![0u8; span_bytes(bit, count) as usize];
    let mut i = u64::from(bit);
    let end = i + count;
    // whole bytes first when aligned, single bits at the edges
    while i < end {
        if i % 8 == 0 && end - i >= 8 {
            mask[(i / 8) as usize] = 0xFF;
            i += 8;
        } else {
            mask[(i / 8) as usize] |= 1 << (i % 8);
            i += 1;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_edges() {
        assert_eq!(bit_mask(0, 8), vec![0xFF]);
        assert_eq!(bit_mask(3, 2), vec![0b0001_1000]);
        assert_eq!(bit_mask(6, 4), vec![0b1100_0000, 0b0000_0011]);
        assert_eq!(bit_mask(1, 23), vec![0xFE, 0xFF, 0xFF]);
        assert!(bit_mask(0, 0).is_empty());
    }

    #[test]
    fn copy_preserves_neighbours() {
        let src = [0b1011_0110u8];
        let mut dst = [0x00u8, 0xFF];
        copy_bits(&src, 1, &mut dst, 6, 4);
        // src bits 1..5 = 1,1,0,1 land at dst bits 6,7,8,9
        assert_eq!(dst, [0b1100_0000, 0b1111_1110]);
    }

    #[test]
    fn copy_zero_bits_is_noop() {
        let mut dst = [0xAAu8];
        copy_bits(&[0xFF], 0, &mut dst, 0, 0);
        assert_eq!(dst, [0xAA]);
    }
}
