//! Read-modify-write operations on single elements.
//!
//! The engine is borrowed exclusively for the whole operation, so no other
//! write can land between the read and the write. The result is written
//! through the normal write path and propagates to mapped tags.

use tracing::debug;

use tagdb_codec::convert;
use tagdb_types::{Handle, Primitive};

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

/// Operation applied by [`Engine::atomic_op`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    /// Add the operand, wrapping on integer overflow.
    Inc,
    /// Subtract the operand, wrapping on integer overflow.
    Dec,
    /// Bitwise complement. The operand is ignored.
    Not,
    Or,
    And,
    Nor,
    Nand,
    Xor,
}

impl AtomicOp {
    fn is_arithmetic(self) -> bool {
        matches!(self, AtomicOp::Inc | AtomicOp::Dec)
    }
}

impl Engine {
    /// Apply `op` to the single element behind `handle` and return the new
    /// value in native byte order.
    ///
    /// `operand` is a native value of the element's type; booleans use one
    /// byte whose bit 0 is the value. Arithmetic is rejected on booleans and
    /// bitwise operations on floating-point types. Overrides are ignored:
    /// the operation reads and writes the stored value.
    pub fn atomic_op(
        &mut self,
        handle: &Handle,
        op: AtomicOp,
        operand: &[u8],
    ) -> EngineResult<Vec<u8>> {
        let illegal = |reason| EngineError::IllegalAtomic {
            op,
            type_code: handle.type_code,
            reason,
        };
        if handle.count != 1 {
            return Err(illegal("handle must cover exactly one element"));
        }
        let prim = handle
            .type_code
            .primitive()
            .ok_or_else(|| illegal("compound types have no atomic operations"))?;
        self.writable_tag(handle, u64::from(handle.size))?;

        let stored = self.read_stored(handle)?;
        let current = if prim == Primitive::Bool {
            vec![(stored.first().copied().unwrap_or(0) >> handle.bit) & 1]
        } else {
            let mut value = stored;
            convert(&self.registry, handle.type_code, 1, &mut value, self.byte_order)?;
            value
        };
        if op != AtomicOp::Not && operand.len() != current.len() {
            return Err(tagdb_codec::CodecError::BufferSize {
                expected: current.len(),
                actual: operand.len(),
            }
            .into());
        }

        let next = match prim {
            Primitive::Bool if op.is_arithmetic() => {
                return Err(illegal("arithmetic on a boolean"));
            }
            Primitive::Bool => {
                let b = operand.first().copied().unwrap_or(0);
                vec![bitwise(op, u64::from(current[0]), u64::from(b)) as u8 & 1]
            }
            Primitive::Real | Primitive::Lreal if !op.is_arithmetic() => {
                return Err(illegal("bitwise operation on a floating-point value"));
            }
            Primitive::Real => {
                let (a, b) = (f32_from(&current), f32_from(operand));
                let sum = if op == AtomicOp::Inc { a + b } else { a - b };
                sum.to_ne_bytes().to_vec()
            }
            Primitive::Lreal => {
                let (a, b) = (f64_from(&current), f64_from(operand));
                let sum = if op == AtomicOp::Inc { a + b } else { a - b };
                sum.to_ne_bytes().to_vec()
            }
            _ => {
                let (a, b) = (load(&current), load(operand));
                let raw = match op {
                    AtomicOp::Inc => a.wrapping_add(b),
                    AtomicOp::Dec => a.wrapping_sub(b),
                    _ => bitwise(op, a, b),
                };
                store(raw, current.len())
            }
        };

        self.write_typed(handle, &next)?;
        debug!(index = handle.index.raw(), byte = handle.byte, ?op, "atomic operation applied");
        Ok(next)
    }
}

fn bitwise(op: AtomicOp, a: u64, b: u64) -> u64 {
    match op {
        AtomicOp::Not => !a,
        AtomicOp::Or => a | b,
        AtomicOp::And => a & b,
        AtomicOp::Nor => !(a | b),
        AtomicOp::Nand => !(a & b),
        AtomicOp::Xor => a ^ b,
        AtomicOp::Inc | AtomicOp::Dec => a,
    }
}

// Integers are handled as their two's-complement bit pattern, so wrapping
// add and subtract are the same for signed and unsigned widths.
fn load(bytes: &[u8]) -> u64 {
    match *bytes {
        [a] => u64::from(a),
        [a, b] => u64::from(u16::from_ne_bytes([a, b])),
        [a, b, c, d] => u64::from(u32::from_ne_bytes([a, b, c, d])),
        [a, b, c, d, e, f, g, h] => u64::from_ne_bytes([a, b, c, d, e, f, g, h]),
        _ => 0,
    }
}

fn store(value: u64, width: usize) -> Vec<u8> {
    match width {
        1 => vec![value as u8],
        2 => (value as u16).to_ne_bytes().to_vec(),
        4 => (value as u32).to_ne_bytes().to_vec(),
        _ => value.to_ne_bytes().to_vec(),
    }
}

fn f32_from(bytes: &[u8]) -> f32 {
    f32::from_bits(load(bytes) as u32)
}

fn f64_from(bytes: &[u8]) -> f64 {
    f64::from_bits(load(bytes))
}

#[cfg(test)]
mod tests {
    use tagdb_codec::ByteOrder;
    use tagdb_types::TypeCode;

    use crate::config::EngineConfig;
    use crate::error::ErrorCategory;

    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn signed_and_unsigned_arithmetic_wraps() {
        let mut e = engine();
        let i = e.add_tag("i", TypeCode::INT, 1).unwrap();
        e.write_typed(&i, &i16::MAX.to_ne_bytes()).unwrap();
        let out = e.atomic_op(&i, AtomicOp::Inc, &1i16.to_ne_bytes()).unwrap();
        assert_eq!(out, i16::MIN.to_ne_bytes());
        assert_eq!(e.read_value(&i).unwrap(), i16::MIN.to_ne_bytes());

        let u = e.add_tag("u", TypeCode::UDINT, 1).unwrap();
        e.atomic_op(&u, AtomicOp::Dec, &3u32.to_ne_bytes()).unwrap();
        assert_eq!(e.read_value(&u).unwrap(), (u32::MAX - 2).to_ne_bytes());

        let l = e.add_tag("l", TypeCode::LINT, 1).unwrap();
        e.atomic_op(&l, AtomicOp::Dec, &(-40i64).to_ne_bytes()).unwrap();
        assert_eq!(e.read_value(&l).unwrap(), 40i64.to_ne_bytes());
    }

    #[test]
    fn big_endian_store_is_converted() {
        let mut e = Engine::new(EngineConfig {
            byte_order: ByteOrder::Big,
            ..EngineConfig::default()
        })
        .unwrap();
        let w = e.add_tag("w", TypeCode::UINT, 1).unwrap();
        e.write_typed(&w, &0x00FFu16.to_ne_bytes()).unwrap();
        e.atomic_op(&w, AtomicOp::Inc, &1u16.to_ne_bytes()).unwrap();
        assert_eq!(e.read(&w).unwrap(), 0x0100u16.to_be_bytes());
    }

    #[test]
    fn floats_add_and_subtract() {
        let mut e = engine();
        let r = e.add_tag("r", TypeCode::REAL, 1).unwrap();
        e.write_typed(&r, &1.5f32.to_ne_bytes()).unwrap();
        e.atomic_op(&r, AtomicOp::Inc, &2.25f32.to_ne_bytes()).unwrap();
        assert_eq!(e.read_value(&r).unwrap(), 3.75f32.to_ne_bytes());

        let d = e.add_tag("d", TypeCode::LREAL, 1).unwrap();
        e.atomic_op(&d, AtomicOp::Dec, &0.5f64.to_ne_bytes()).unwrap();
        assert_eq!(e.read_value(&d).unwrap(), (-0.5f64).to_ne_bytes());

        let err = e.atomic_op(&d, AtomicOp::Xor, &0.5f64.to_ne_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::IllegalAtomic { .. }));
    }

    #[test]
    fn bitwise_ops_on_words() {
        let mut e = engine();
        let w = e.add_tag("w", TypeCode::BYTE, 1).unwrap();
        e.write_typed(&w, &[0b1100_1010]).unwrap();
        let cases = [
            (AtomicOp::Or, 0b0000_0101, 0b1100_1111),
            (AtomicOp::And, 0b0101_1100, 0b0100_1100),
            (AtomicOp::Xor, 0b1111_0000, 0b1011_1100),
            (AtomicOp::Not, 0, 0b0100_0011),
            (AtomicOp::Nor, 0b0000_0011, 0b1011_1100),
            (AtomicOp::Nand, 0b1111_0000, 0b0100_1111),
        ];
        for (op, operand, want) in cases {
            assert_eq!(e.atomic_op(&w, op, &[operand]).unwrap(), vec![want], "{op:?}");
        }
    }

    #[test]
    fn single_bools_toggle_in_place() {
        let mut e = engine();
        let flags = e.add_tag("flags", TypeCode::BOOL, 8).unwrap();
        e.write_typed(&flags, &[0b1000_0001]).unwrap();
        let third = e.element_handle(flags.index, 3, 1).unwrap();
        assert_eq!(e.atomic_op(&third, AtomicOp::Not, &[]).unwrap(), vec![1]);
        assert_eq!(e.read_value(&flags).unwrap(), vec![0b1000_1001]);
        assert_eq!(e.atomic_op(&third, AtomicOp::And, &[0]).unwrap(), vec![0]);
        assert_eq!(e.read_value(&flags).unwrap(), vec![0b1000_0001]);

        let err = e.atomic_op(&third, AtomicOp::Inc, &[1]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn results_propagate_through_mappings() {
        let mut e = engine();
        let a = e.add_tag("a", TypeCode::DINT, 1).unwrap();
        let b = e.add_tag("b", TypeCode::DINT, 1).unwrap();
        e.add_mapping(&a, &b).unwrap();
        e.atomic_op(&a, AtomicOp::Inc, &5i32.to_ne_bytes()).unwrap();
        e.atomic_op(&a, AtomicOp::Inc, &5i32.to_ne_bytes()).unwrap();
        assert_eq!(e.read_value(&b).unwrap(), 10i32.to_ne_bytes());
    }

    #[test]
    fn rejects_bad_targets() {
        let mut e = engine();
        let arr = e.add_tag("arr", TypeCode::INT, 4).unwrap();
        assert!(matches!(
            e.atomic_op(&arr, AtomicOp::Inc, &1i16.to_ne_bytes()),
            Err(EngineError::IllegalAtomic { .. })
        ));
        let one = e.element_handle(arr.index, 0, 1).unwrap();
        assert!(matches!(
            e.atomic_op(&one, AtomicOp::Inc, &1i32.to_ne_bytes()),
            Err(EngineError::Codec(_))
        ));
        e.set_read_only(arr.index, true).unwrap();
        assert!(matches!(
            e.atomic_op(&one, AtomicOp::Inc, &1i16.to_ne_bytes()),
            Err(EngineError::ReadOnly(_))
        ));

        let code = e.create_type("Pair:a,INT,1:b,INT,1").unwrap();
        let pair = e.add_tag("pair", code, 1).unwrap();
        assert!(matches!(
            e.atomic_op(&pair, AtomicOp::Inc, &[0; 4]),
            Err(EngineError::IllegalAtomic { .. })
        ));
    }
}
