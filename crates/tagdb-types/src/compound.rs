//! Compound (user-defined) types and the registry that owns them.
//!
//! A compound type is an ordered list of named members, each a primitive or
//! an already registered compound, with an element count. Types are
//! immutable once created, so member offsets are computed a single time at
//! registration.
//!
//! Layout rules: `BOOL` members take `count` bits at the running bit
//! position; every other member starts at the next multiple of its own
//! alignment. The whole type is padded to its alignment (the widest member
//! alignment, never less than a byte) so arrays of it stay aligned.

use serde::{Deserialize, Serialize};

use crate::code::{align_up, Primitive, TypeCode};
use crate::error::{TypeError, TypeResult};
use crate::names::validate_name;

/// Largest compound element, in bits. Handle sizes are 32-bit byte counts.
pub const MAX_COMPOUND_BITS: u64 = u32::MAX as u64 * 8;

/// One member of a compound type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub type_code: TypeCode,
    pub count: u32,
}

impl Member {
    /// A member of `count` elements of `type_code`.
    pub fn new(name: impl Into<String>, type_code: TypeCode, count: u32) -> Self {
        Self {
            name: name.into(),
            type_code,
            count,
        }
    }
}

/// A registered compound type with its precomputed layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundType {
    pub name: String,
    pub members: Vec<Member>,
    /// Bit offset of each member from the start of one element.
    pub offsets: Vec<u64>,
    /// Size of one element in bits, a multiple of `align_bits`.
    pub size_bits: u64,
    pub align_bits: u64,
}

impl CompoundType {
    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        (self.size_bits / 8) as usize
    }

    /// Iterate members paired with their bit offsets.
    pub fn layout(&self) -> impl Iterator<Item = (&Member, u64)> {
        self.members.iter().zip(self.offsets.iter().copied())
    }
}

/// Owner of all compound types, addressed by [`TypeCode::compound`].
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<CompoundType>,
    refcounts: Vec<u32>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered compound types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no compound type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The compound type behind `code`.
    pub fn get(&self, code: TypeCode) -> TypeResult<&CompoundType> {
        code.compound_index()
            .and_then(|i| self.types.get(i))
            .ok_or(TypeError::UnknownType(code.raw()))
    }

    /// Width of one element of `code`, in bits.
    pub fn bits(&self, code: TypeCode) -> TypeResult<u64> {
        match code.primitive() {
            Some(p) => Ok(p.bits()),
            None => self.get(code).map(|c| c.size_bits),
        }
    }

    /// Required start alignment of `code`, in bits.
    pub fn align_bits(&self, code: TypeCode) -> TypeResult<u64> {
        match code.primitive() {
            Some(p) => Ok(p.bits()),
            None => self.get(code).map(|c| c.align_bits),
        }
    }

    /// Resolve a type name, primitives first, case-insensitively.
    pub fn by_name(&self, name: &str) -> TypeResult<TypeCode> {
        if let Some(p) = Primitive::from_name(name) {
            return Ok(p.code());
        }
        self.types
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .map(|i| TypeCode::compound(i as u32))
            .ok_or_else(|| TypeError::UnknownTypeName(name.to_string()))
    }

    /// Canonical name of `code`.
    pub fn name_of(&self, code: TypeCode) -> TypeResult<String> {
        match code.primitive() {
            Some(p) => Ok(p.name().to_string()),
            None => self.get(code).map(|c| c.name.clone()),
        }
    }

    /// Register a compound type.
    ///
    /// Registering a definition identical to an existing one returns the
    /// existing code; a different definition under a taken name is rejected.
    pub fn create(&mut self, name: &str, members: Vec<Member>) -> TypeResult<TypeCode> {
        validate_name(name)?;
        if Primitive::from_name(name).is_some() {
            return Err(TypeError::DuplicateType(name.to_string()));
        }
        if let Ok(existing) = self.by_name(name) {
            let current = self.get(existing)?;
            return if current.name == name && current.members == members {
                Ok(existing)
            } else {
                Err(TypeError::DuplicateType(name.to_string()))
            };
        }
        if members.is_empty() {
            return Err(TypeError::InvalidDefinition {
                definition: name.to_string(),
                reason: "no members".into(),
            });
        }

        let too_large = || TypeError::TypeTooLarge(name.to_string());
        let mut offsets = Vec::with_capacity(members.len());
        let mut pos = 0u64;
        let mut align = 8u64;
        for (i, member) in members.iter().enumerate() {
            validate_name(&member.name)?;
            if members[..i]
                .iter()
                .any(|m| m.name.eq_ignore_ascii_case(&member.name))
            {
                return Err(TypeError::DuplicateMember {
                    compound: name.to_string(),
                    member: member.name.clone(),
                });
            }
            if member.count == 0 {
                return Err(TypeError::ZeroCount);
            }
            if member.type_code.is_queue() {
                return Err(TypeError::InvalidDefinition {
                    definition: name.to_string(),
                    reason: format!("member {} cannot be a queue", member.name),
                });
            }
            let bits = self.bits(member.type_code)?;
            let offset = if member.type_code.is_bool() {
                pos
            } else {
                let member_align = self.align_bits(member.type_code)?;
                align = align.max(member_align);
                pos.checked_next_multiple_of(member_align)
                    .ok_or_else(too_large)?
            };
            offsets.push(offset);
            pos = bits
                .checked_mul(u64::from(member.count))
                .and_then(|width| offset.checked_add(width))
                .filter(|end| *end <= MAX_COMPOUND_BITS)
                .ok_or_else(too_large)?;
        }
        let size_bits = align_up(pos.max(1), align);
        if size_bits > MAX_COMPOUND_BITS {
            return Err(too_large());
        }

        self.types.push(CompoundType {
            name: name.to_string(),
            members,
            offsets,
            size_bits,
            align_bits: align,
        });
        self.refcounts.push(0);
        Ok(TypeCode::compound((self.types.len() - 1) as u32))
    }

    /// Register a compound type from `Name:member,TYPE,count:...`.
    ///
    /// ```
    /// use tagdb_types::{TypeCode, TypeRegistry};
    ///
    /// let mut reg = TypeRegistry::new();
    /// let code = reg.create_from_definition("Motor:run,BOOL,1:speed,INT,1").unwrap();
    /// assert_eq!(reg.bits(code).unwrap(), 32);
    /// assert_eq!(reg.serialize(code).unwrap(), "Motor:run,BOOL,1:speed,INT,1");
    /// ```
    pub fn create_from_definition(&mut self, definition: &str) -> TypeResult<TypeCode> {
        let invalid = |reason: String| TypeError::InvalidDefinition {
            definition: definition.to_string(),
            reason,
        };
        let mut parts = definition.split(':');
        let name = parts.next().unwrap_or_default();
        let mut members = Vec::new();
        for part in parts {
            let fields: Vec<&str> = part.split(',').collect();
            let [member, type_name, count] = fields.as_slice() else {
                return Err(invalid(format!("member {part:?} needs name,TYPE,count")));
            };
            let type_code = self.by_name(type_name.trim())?;
            let count = count
                .trim()
                .parse::<u32>()
                .map_err(|e| invalid(format!("bad count {count:?}: {e}")))?;
            members.push(Member::new(member.trim(), type_code, count));
        }
        self.create(name.trim(), members)
    }

    /// Canonical definition string of a compound type.
    pub fn serialize(&self, code: TypeCode) -> TypeResult<String> {
        let compound = self.get(code)?;
        let mut out = compound.name.clone();
        for member in &compound.members {
            let type_name = self.name_of(member.type_code)?;
            out.push_str(&format!(":{},{},{}", member.name, type_name, member.count));
        }
        Ok(out)
    }

    /// Record one more tag using `code`. No-op for primitives.
    pub fn retain(&mut self, code: TypeCode) {
        if let Some(rc) = code.compound_index().and_then(|i| self.refcounts.get_mut(i)) {
            *rc += 1;
        }
    }

    /// Record one less tag using `code`.
    pub fn release(&mut self, code: TypeCode) {
        if let Some(rc) = code.compound_index().and_then(|i| self.refcounts.get_mut(i)) {
            *rc = rc.saturating_sub(1);
        }
    }

    /// Number of tags currently using `code`.
    pub fn refcount(&self, code: TypeCode) -> u32 {
        code.compound_index()
            .and_then(|i| self.refcounts.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate registered types with their codes.
    pub fn iter(&self) -> impl Iterator<Item = (TypeCode, &CompoundType)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, c)| (TypeCode::compound(i as u32), c))
    }
}
