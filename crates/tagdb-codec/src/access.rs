//! Typed reads and writes over any byte-addressed tag store.

use tagdb_types::{Handle, TypeRegistry};

use crate::bits::{bit_mask, copy_bits, span_bytes};
use crate::convert::convert;
use crate::error::CodecError;
use crate::order::ByteOrder;

/// Raw byte access to a tag store, the seam between the codec and storage.
///
/// Implementations translate `handle.byte` into their backing memory, bound
/// check the request, and reject it wholesale when it does not fit.
pub trait RawAccess {
    type Error: From<CodecError>;

    /// Registry used to resolve compound types.
    fn registry(&self) -> &TypeRegistry;

    /// Byte order of multi-byte values in the store.
    fn byte_order(&self) -> ByteOrder;

    /// Read `handle.size` bytes starting at `handle.byte`.
    fn read_raw(&self, handle: &Handle) -> Result<Vec<u8>, Self::Error>;

    /// Write `data` starting at `handle.byte`.
    fn write_raw(&mut self, handle: &Handle, data: &[u8]) -> Result<(), Self::Error>;

    /// Write only the bits of `data` selected by `mask`, starting at `handle.byte`.
    fn masked_write_raw(
        &mut self,
        handle: &Handle,
        data: &[u8],
        mask: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Size in bytes of the native value a handle reads or writes.
///
/// Boolean ranges are packed one bit per element starting at bit 0, so they
/// take `ceil(count / 8)` bytes regardless of the handle's bit offset.
pub fn value_len(registry: &TypeRegistry, handle: &Handle) -> Result<usize, CodecError> {
    let count = handle.count as usize;
    if handle.type_code.is_bool() {
        return Ok(count.div_ceil(8));
    }
    let bits = registry.bits(handle.type_code)? as usize;
    Ok(bits / 8 * count)
}

/// Read the value behind `handle` into `out` in native byte order.
///
/// Boolean ranges are shifted so the first element lands in bit 0 of
/// `out[0]`; unused bits of the last byte read as zero. Returns the number of
/// bytes written to `out`.
pub fn read_typed<A: RawAccess + ?Sized>(
    access: &A,
    handle: &Handle,
    out: &mut [u8],
) -> Result<usize, A::Error> {
    let len = value_len(access.registry(), handle)?;
    if out.len() < len {
        return Err(CodecError::BufferSize {
            expected: len,
            actual: out.len(),
        }
        .into());
    }
    let raw = access.read_raw(handle)?;
    let out = &mut out[..len];

    if handle.type_code.is_bool() {
        let count = u64::from(handle.count);
        let span = span_bytes(handle.bit, count) as usize;
        if raw.len() < span {
            return Err(CodecError::BufferSize {
                expected: span,
                actual: raw.len(),
            }
            .into());
        }
        out.fill(0);
        copy_bits(&raw, u64::from(handle.bit), out, 0, count);
        return Ok(len);
    }

    let Some(value) = raw.get(..len) else {
        return Err(CodecError::BufferSize {
            expected: len,
            actual: raw.len(),
        }
        .into());
    };
    out.copy_from_slice(value);
    convert(
        access.registry(),
        handle.type_code,
        handle.count,
        out,
        access.byte_order(),
    )?;
    Ok(len)
}

/// Write the native value in `data` to the range behind `handle`.
///
/// `data` must be exactly [`value_len`] bytes. Boolean ranges that start or
/// end inside a byte go through a masked write so neighbouring bits keep
/// their values.
pub fn write_typed<A: RawAccess + ?Sized>(
    access: &mut A,
    handle: &Handle,
    data: &[u8],
) -> Result<(), A::Error> {
    let len = value_len(access.registry(), handle)?;
    if data.len() != len {
        return Err(CodecError::BufferSize {
            expected: len,
            actual: data.len(),
        }
        .into());
    }

    if handle.type_code.is_bool() {
        if handle.bit == 0 && handle.count % 8 == 0 {
            return access.write_raw(handle, data);
        }
        let count = u64::from(handle.count);
        let mut shadow = vec![0u8; span_bytes(handle.bit, count) as usize];
        copy_bits(data, 0, &mut shadow, u64::from(handle.bit), count);
        let mask = bit_mask(handle.bit, count);
        return access.masked_write_raw(handle, &shadow, &mask);
    }

    let mut buf = data.to_vec();
    convert(
        access.registry(),
        handle.type_code,
        handle.count,
        &mut buf,
        access.byte_order(),
    )?;
    access.write_raw(handle, &buf)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tagdb_types::{TagIndex, TypeCode};

    use super::*;

    /// Flat byte store with no tag bookkeeping.
    struct Flat {
        bytes: Vec<u8>,
        registry: TypeRegistry,
        order: ByteOrder,
    }

    impl Flat {
        fn new(len: usize, order: ByteOrder) -> Self {
            Self {
                bytes: vec![0; len],
                registry: TypeRegistry::new(),
                order,
            }
        }

        fn range(&self, handle: &Handle, len: usize) -> Result<std::ops::Range<usize>, CodecError> {
            let start = handle.byte as usize;
            if start + len > self.bytes.len() {
                return Err(CodecError::BufferSize {
                    expected: start + len,
                    actual: self.bytes.len(),
                });
            }
            Ok(start..start + len)
        }
    }

    impl RawAccess for Flat {
        type Error = CodecError;

        fn registry(&self) -> &TypeRegistry {
            &self.registry
        }

        fn byte_order(&self) -> ByteOrder {
            self.order
        }

        fn read_raw(&self, handle: &Handle) -> Result<Vec<u8>, CodecError> {
            let r = self.range(handle, handle.size as usize)?;
            Ok(self.bytes[r].to_vec())
        }

        fn write_raw(&mut self, handle: &Handle, data: &[u8]) -> Result<(), CodecError> {
            let r = self.range(handle, data.len())?;
            self.bytes[r].copy_from_slice(data);
            Ok(())
        }

        fn masked_write_raw(
            &mut self,
            handle: &Handle,
            data: &[u8],
            mask: &[u8],
        ) -> Result<(), CodecError> {
            let r = self.range(handle, data.len())?;
            for ((b, d), m) in self.bytes[r].iter_mut().zip(data).zip(mask) {
                *b = (*b & !m) | (d & m);
            }
            Ok(())
        }
    }

    fn handle(flat: &Flat, bit_address: u64, code: TypeCode, count: u32) -> Handle {
        let bits = flat.registry.bits(code).unwrap();
        Handle::new(TagIndex::new(1), bit_address, code, count, bits)
    }

    #[test]
    fn big_endian_store_layout() {
        let mut flat = Flat::new(8, ByteOrder::Big);
        let h = handle(&flat, 16, TypeCode::INT, 1);
        write_typed(&mut flat, &h, &0x1234u16.to_ne_bytes()).unwrap();
        assert_eq!(&flat.bytes[2..4], &[0x12, 0x34]);

        let mut out = [0u8; 2];
        assert_eq!(read_typed(&flat, &h, &mut out).unwrap(), 2);
        assert_eq!(u16::from_ne_bytes(out), 0x1234);
    }

    #[test]
    fn little_endian_store_layout() {
        let mut flat = Flat::new(8, ByteOrder::Little);
        let h = handle(&flat, 0, TypeCode::DINT, 1);
        write_typed(&mut flat, &h, &(-2i32).to_ne_bytes()).unwrap();
        assert_eq!(&flat.bytes[0..4], &(-2i32).to_le_bytes());
    }

    #[test]
    fn unaligned_bools_keep_neighbours() {
        let mut flat = Flat::new(4, ByteOrder::Little);
        flat.bytes = vec![0xFF, 0x00, 0xFF, 0x00];
        // bits 5..15
        let h = handle(&flat, 5, TypeCode::BOOL, 10);
        write_typed(&mut flat, &h, &[0b0000_0000, 0b0000_0010]).unwrap();
        assert_eq!(flat.bytes, vec![0b0001_1111, 0b0100_0000, 0xFF, 0x00]);

        let mut out = [0xAAu8; 2];
        read_typed(&flat, &h, &mut out).unwrap();
        assert_eq!(out, [0b0000_0000, 0b0000_0010]);
    }

    #[test]
    fn aligned_bools_write_whole_bytes() {
        let mut flat = Flat::new(4, ByteOrder::Big);
        let h = handle(&flat, 8, TypeCode::BOOL, 16);
        write_typed(&mut flat, &h, &[0x81, 0x7E]).unwrap();
        assert_eq!(flat.bytes, vec![0, 0x81, 0x7E, 0]);
    }

    #[test]
    fn buffer_size_is_checked() {
        let mut flat = Flat::new(8, ByteOrder::Little);
        let h = handle(&flat, 0, TypeCode::INT, 2);
        assert_eq!(
            write_typed(&mut flat, &h, &[0; 3]),
            Err(CodecError::BufferSize {
                expected: 4,
                actual: 3
            })
        );
        let mut out = [0u8; 3];
        assert!(read_typed(&flat, &h, &mut out).is_err());
        assert_eq!(flat.bytes, vec![0; 8]);
    }

    fn sample_type(reg: &mut TypeRegistry) -> TypeCode {
        reg.create_from_definition("Cell:on,BOOL,3:level,DINT,2:alarms,BOOL,11")
            .unwrap();
        reg.create_from_definition("Rack:tag,BOOL,1:cells,Cell,2:total,DINT,1")
            .unwrap()
    }

    proptest! {
        #[test]
        fn compound_round_trip(
            big in any::<bool>(),
            bytes in prop::collection::vec(any::<u8>(), 40..=40),
        ) {
            let order = if big { ByteOrder::Big } else { ByteOrder::Little };
            let mut flat = Flat::new(64, order);
            let code = sample_type(&mut flat.registry);
            let h = handle(&flat, 64, code, 1);
            prop_assert_eq!(value_len(&flat.registry, &h).unwrap(), 40);

            write_typed(&mut flat, &h, &bytes).unwrap();
            let mut out = vec![0u8; 40];
            read_typed(&flat, &h, &mut out).unwrap();
            prop_assert_eq!(out, bytes);
            prop_assert!(flat.bytes[..8].iter().all(|b| *b == 0));
            prop_assert!(flat.bytes[48..].iter().all(|b| *b == 0));
        }

        #[test]
        fn bool_round_trip_at_any_offset(
            start in 0u64..64,
            count in 1u32..40,
            seed in prop::collection::vec(any::<u8>(), 5..=5),
            fill in any::<u8>(),
        ) {
            let mut flat = Flat::new(16, ByteOrder::Little);
            flat.bytes = vec![fill; 16];
            let before = flat.bytes.clone();
            let h = handle(&flat, start, TypeCode::BOOL, count);

            let len = (count as usize).div_ceil(8);
            let mut value = seed[..len].to_vec();
            if count % 8 != 0 {
                value[len - 1] &= (1u8 << (count % 8)) - 1;
            }
            write_typed(&mut flat, &h, &value).unwrap();

            let mut out = vec![0u8; len];
            read_typed(&flat, &h, &mut out).unwrap();
            prop_assert_eq!(&out, &value);

            // bits outside the range are untouched
            for bit in (0..128u64).filter(|b| *b < start || *b >= start + u64::from(count)) {
                let mask = 1u8 << (bit % 8);
                let i = (bit / 8) as usize;
                prop_assert_eq!(flat.bytes[i] & mask, before[i] & mask);
            }
        }
    }
}
