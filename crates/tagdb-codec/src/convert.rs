//! Recursive, type-directed byte-order conversion.
//!
//! Conversion is its own inverse: the same call turns native values into the
//! store representation and back. Booleans are never reordered.

use tagdb_types::{TypeCode, TypeRegistry};

use crate::error::{CodecError, CodecResult};
use crate::order::ByteOrder;

/// Convert `count` elements of `code` at the start of `buf` between native
/// and `order`, in place. Returns the number of bytes the elements occupy.
pub fn convert(
    registry: &TypeRegistry,
    code: TypeCode,
    count: u32,
    buf: &mut [u8],
    order: ByteOrder,
) -> CodecResult<usize> {
    let count = count as usize;
    let available = buf.len();
    let needed = |len: usize| -> CodecResult<()> {
        if available >= len {
            Ok(())
        } else {
            Err(CodecError::BufferSize {
                expected: len,
                actual: available,
            })
        }
    };

    if code.is_bool() {
        let len = count.div_ceil(8);
        needed(len)?;
        return Ok(len);
    }

    if let Some(p) = code.primitive() {
        let width = p.bytes();
        let len = width * count;
        needed(len)?;
        if width > 1 && !order.is_native() {
            for elem in buf[..len].chunks_exact_mut(width) {
                elem.reverse();
            }
        }
        return Ok(len);
    }

    let compound = registry.get(code)?;
    let stride = compound.size_bytes();
    let len = stride * count;
    needed(len)?;
    if order.is_native() {
        return Ok(len);
    }
    for elem in buf[..len].chunks_exact_mut(stride) {
        for (member, offset) in compound.layout() {
            if member.type_code.is_bool() {
                continue;
            }
            // non-bool members are at least byte aligned
            let start = (offset / 8) as usize;
            convert(registry, member.type_code, member.count, &mut elem[start..], order)?;
        }
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAP: ByteOrder = if cfg!(target_endian = "big") {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };

    #[test]
    fn native_order_is_identity() {
        let reg = TypeRegistry::new();
        let mut buf = 0x1122_3344u32.to_ne_bytes();
        let used = convert(&reg, TypeCode::UDINT, 1, &mut buf, ByteOrder::NATIVE).unwrap();
        assert_eq!(used, 4);
        assert_eq!(buf, 0x1122_3344u32.to_ne_bytes());
    }

    #[test]
    fn foreign_order_swaps_each_element() {
        let reg = TypeRegistry::new();
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x0102u16.to_ne_bytes());
        buf.extend_from_slice(&0x0304u16.to_ne_bytes());
        convert(&reg, TypeCode::INT, 2, &mut buf, SWAP).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&0x0102u16.to_ne_bytes());
        expected[..2].reverse();
        expected.extend_from_slice(&0x0304u16.to_ne_bytes());
        expected[2..].reverse();
        assert_eq!(buf, expected);
    }

    #[test]
    fn bools_and_bytes_are_untouched() {
        let reg = TypeRegistry::new();
        let mut buf = [0xA5u8, 0x3C];
        assert_eq!(convert(&reg, TypeCode::BOOL, 10, &mut buf, SWAP).unwrap(), 2);
        assert_eq!(convert(&reg, TypeCode::SINT, 2, &mut buf, SWAP).unwrap(), 2);
        assert_eq!(buf, [0xA5, 0x3C]);
    }

    #[test]
    fn compound_members_are_walked_recursively() {
        let mut reg = TypeRegistry::new();
        let inner = reg.create_from_definition("In:f,BOOL,4:v,INT,1").unwrap();
        let outer = reg
            .create_from_definition("Out:b,BOOL,1:i,In,2:d,DINT,1")
            .unwrap();
        // Out: b@0, i@16 (two 32-bit In elements), d@96, 128 bits total
        assert_eq!(reg.bits(outer).unwrap(), 128);
        assert_eq!(reg.bits(inner).unwrap(), 32);

        let mut buf: Vec<u8> = (0u8..16).collect();
        let used = convert(&reg, outer, 1, &mut buf, SWAP).unwrap();
        assert_eq!(used, 16);
        assert_eq!(
            buf,
            vec![0, 1, 2, 3, 5, 4, 6, 7, 9, 8, 10, 11, 15, 14, 13, 12]
        );
        convert(&reg, outer, 1, &mut buf, SWAP).unwrap();
        assert_eq!(buf, (0u8..16).collect::<Vec<_>>());
    }

    #[test]
    fn short_buffer_is_rejected() {
        let reg = TypeRegistry::new();
        let mut buf = [0u8; 7];
        assert_eq!(
            convert(&reg, TypeCode::LREAL, 1, &mut buf, SWAP),
            Err(CodecError::BufferSize {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn unknown_compound_is_rejected() {
        let reg = TypeRegistry::new();
        let mut buf = [0u8; 8];
        assert!(matches!(
            convert(&reg, TypeCode::compound(0), 1, &mut buf, SWAP),
            Err(CodecError::Type(_))
        ));
    }
}
