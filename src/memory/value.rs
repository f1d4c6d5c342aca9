//! Runtime value representation
//!
//! A [`Value`] is a raw scalar together with its type and a validity flag.
//! Pointer values also carry a [`PointerTarget`]: the array or object they
//! were formed from, which is what distinguishes a one-past-the-end pointer
//! (valid, not dereferenceable) from a pointer into an unrelated object.
//!
//! Atomic values are stored in memory as little-endian bytes:
//! - `char`, `bool`: 1 byte
//! - `int`, `float`: 4 bytes
//! - `double`, pointers: 8 bytes

use std::fmt;

use super::ObjectId;
use crate::types::{AtomicKind, Type};

/// Memory address type
pub type Address = u64;

/// Where a pointer value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerTarget {
    /// A raw address with no provenance (null, or read from garbage)
    #[default]
    None,
    /// Formed from the elements of this array object
    Array(ObjectId),
    /// Formed from this single object
    Object(ObjectId),
}

/// Raw scalar storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
}

/// A typed runtime value
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub raw: RawValue,
    pub ty: Type,
    pub valid: bool,
    pub target: PointerTarget,
}

impl Value {
    /// An integral (char, int, bool) value, truncated to the width of `ty`
    pub fn int(value: i64, ty: Type) -> Self {
        let raw = match ty.atomic_kind() {
            Some(AtomicKind::Char) => i64::from(value as i8),
            Some(AtomicKind::Int) => i64::from(value as i32),
            Some(AtomicKind::Bool) => i64::from(value != 0),
            _ => value,
        };
        Value {
            raw: RawValue::Int(raw),
            ty,
            valid: true,
            target: PointerTarget::None,
        }
    }

    /// A floating value, rounded to `float` precision when `ty` is `float`
    pub fn float(value: f64, ty: Type) -> Self {
        let raw = match ty.atomic_kind() {
            Some(AtomicKind::Float) => f64::from(value as f32),
            _ => value,
        };
        Value {
            raw: RawValue::Float(raw),
            ty,
            valid: true,
            target: PointerTarget::None,
        }
    }

    pub fn bool(value: bool) -> Self {
        Value::int(i64::from(value), Type::bool())
    }

    pub fn pointer(address: Address, ty: Type, target: PointerTarget) -> Self {
        Value {
            raw: RawValue::Int(address as i64),
            ty,
            valid: true,
            target,
        }
    }

    pub fn null(ty: Type) -> Self {
        Value::pointer(0, ty, PointerTarget::None)
    }

    /// The zero value of an atomic type
    pub fn zero(ty: Type) -> Self {
        if ty.is_floating() {
            Value::float(0.0, ty)
        } else if ty.is_pointer() {
            Value::null(ty)
        } else {
            Value::int(0, ty)
        }
    }

    /// Same value marked invalid
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn as_int(&self) -> i64 {
        match self.raw {
            RawValue::Int(v) => v,
            RawValue::Float(f) => f as i64,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self.raw {
            RawValue::Int(v) => v as f64,
            RawValue::Float(f) => f,
        }
    }

    pub fn address(&self) -> Address {
        self.as_int() as Address
    }

    pub fn is_true(&self) -> bool {
        match self.raw {
            RawValue::Int(v) => v != 0,
            RawValue::Float(f) => f != 0.0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ty.is_pointer() && self.as_int() == 0
    }

    /// Encode as little-endian bytes of the type's size
    pub fn to_bytes(&self) -> Vec<u8> {
        match (self.ty.atomic_kind(), self.raw) {
            (Some(AtomicKind::Char | AtomicKind::Bool), raw) => vec![int_of(raw) as u8],
            (Some(AtomicKind::Int), raw) => (int_of(raw) as i32).to_le_bytes().to_vec(),
            (Some(AtomicKind::Float), raw) => (float_of(raw) as f32).to_le_bytes().to_vec(),
            (Some(AtomicKind::Double), raw) => float_of(raw).to_le_bytes().to_vec(),
            (None, raw) => (int_of(raw) as u64).to_le_bytes().to_vec(),
        }
    }

    /// Decode a value of atomic type `ty` from its bytes
    pub fn from_bytes(bytes: &[u8], ty: Type) -> Self {
        let mut buffer = [0u8; 8];
        let len = bytes.len().min(8);
        buffer[..len].copy_from_slice(&bytes[..len]);
        match ty.atomic_kind() {
            Some(AtomicKind::Char) => Value::int(i64::from(buffer[0] as i8), ty),
            Some(AtomicKind::Bool) => Value::int(i64::from(buffer[0]), ty),
            Some(AtomicKind::Int) => {
                Value::int(i64::from(i32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]])), ty)
            }
            Some(AtomicKind::Float) => {
                Value::float(f64::from(f32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]])), ty)
            }
            Some(AtomicKind::Double) => Value::float(f64::from_le_bytes(buffer), ty),
            None => Value::pointer(u64::from_le_bytes(buffer), ty, PointerTarget::None),
        }
    }
}

fn int_of(raw: RawValue) -> i64 {
    match raw {
        RawValue::Int(v) => v,
        RawValue::Float(f) => f as i64,
    }
}

fn float_of(raw: RawValue) -> f64 {
    match raw {
        RawValue::Int(v) => v as f64,
        RawValue::Float(f) => f,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "???");
        }
        match (self.ty.atomic_kind(), self.raw) {
            (Some(AtomicKind::Bool), raw) => write!(f, "{}", int_of(raw) != 0),
            (Some(AtomicKind::Char), raw) => write!(f, "'{}'", char::from(int_of(raw) as u8).escape_default()),
            (Some(_), RawValue::Float(v)) => write!(f, "{}", v),
            (Some(_), RawValue::Int(v)) => write!(f, "{}", v),
            (None, raw) => write!(f, "0x{:x}", int_of(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_bytes_round_trip() {
        let samples = [
            Value::int(-3, Type::char()),
            Value::int(1, Type::bool()),
            Value::int(-123_456, Type::int()),
            Value::float(1.5, Type::float()),
            Value::float(-2.25, Type::double()),
            Value::pointer(0x1234, Type::pointer_to(Type::int()), PointerTarget::None),
        ];
        for value in samples {
            let bytes = value.to_bytes();
            assert_eq!(bytes.len() as u64, value.ty.size(&crate::types::ClassTable::new()));
            assert_eq!(Value::from_bytes(&bytes, value.ty.clone()), value);
        }
    }

    #[test]
    fn test_integral_values_wrap_to_width() {
        assert_eq!(Value::int(300, Type::char()).as_int(), 44);
        assert_eq!(Value::int(i64::from(i32::MAX) + 1, Type::int()).as_int(), i64::from(i32::MIN));
        assert_eq!(Value::int(7, Type::bool()).as_int(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::int(65, Type::char()).to_string(), "'A'");
        assert_eq!(Value::bool(true).to_string(), "true");
        assert_eq!(Value::int(5, Type::int()).invalidated().to_string(), "???");
    }
}
