//! Slate field type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BoolWord;

/// Primitive wire types a Slate field can have.
///
/// Every type has a fixed width; there are no variable-length fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// Boolean carried in a 32-bit word
    Bool,
    /// 8-bit signed integer
    Int8,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit signed integer
    Int16,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit floating point
    #[serde(alias = "FLOAT")]
    Float32,
    /// 64-bit floating point
    #[serde(alias = "DOUBLE")]
    Float64,
}

impl FieldType {
    /// All field types, in declaration order.
    pub const ALL: [FieldType; 11] = [
        FieldType::Bool,
        FieldType::Int8,
        FieldType::UInt8,
        FieldType::Int16,
        FieldType::UInt16,
        FieldType::Int32,
        FieldType::UInt32,
        FieldType::Int64,
        FieldType::UInt64,
        FieldType::Float32,
        FieldType::Float64,
    ];

    /// Returns the size in bytes of this type on the wire.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Bool | FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => 4,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Float64 => 8,
        }
    }

    /// Canonical upper-case name used in schema files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "BOOL",
            FieldType::Int8 => "INT8",
            FieldType::UInt8 => "UINT8",
            FieldType::Int16 => "INT16",
            FieldType::UInt16 => "UINT16",
            FieldType::Int32 => "INT32",
            FieldType::UInt32 => "UINT32",
            FieldType::Int64 => "INT64",
            FieldType::UInt64 => "UINT64",
            FieldType::Float32 => "FLOAT32",
            FieldType::Float64 => "FLOAT64",
        }
    }

    /// Zero value for this type (`false` for BOOL).
    pub const fn default_value(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(BoolWord::FALSE),
            FieldType::Int8 => Value::Int8(0),
            FieldType::UInt8 => Value::UInt8(0),
            FieldType::Int16 => Value::Int16(0),
            FieldType::UInt16 => Value::UInt16(0),
            FieldType::Int32 => Value::Int32(0),
            FieldType::UInt32 => Value::UInt32(0),
            FieldType::Int64 => Value::Int64(0),
            FieldType::UInt64 => Value::UInt64(0),
            FieldType::Float32 => Value::Float32(0.0),
            FieldType::Float64 => Value::Float64(0.0),
        }
    }

    /// Convert `value` into this type if it is exactly representable in it.
    ///
    /// Values coming from loosely typed front-ends (JSON numbers, booleans) rarely
    /// carry the precise variant; this maps them onto the field's own variant without
    /// narrowing. Returns `None` when the value does not fit.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match self {
            FieldType::Bool => match value {
                Value::Bool(word) => Some(Value::Bool(word)),
                other => other
                    .as_integer()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(|n| Value::Bool(BoolWord(n))),
            },
            FieldType::Int8 => {
                value.as_integer().and_then(|n| i8::try_from(n).ok()).map(Value::Int8)
            }
            FieldType::UInt8 => {
                value.as_integer().and_then(|n| u8::try_from(n).ok()).map(Value::UInt8)
            }
            FieldType::Int16 => {
                value.as_integer().and_then(|n| i16::try_from(n).ok()).map(Value::Int16)
            }
            FieldType::UInt16 => {
                value.as_integer().and_then(|n| u16::try_from(n).ok()).map(Value::UInt16)
            }
            FieldType::Int32 => {
                value.as_integer().and_then(|n| i32::try_from(n).ok()).map(Value::Int32)
            }
            FieldType::UInt32 => {
                value.as_integer().and_then(|n| u32::try_from(n).ok()).map(Value::UInt32)
            }
            FieldType::Int64 => {
                value.as_integer().and_then(|n| i64::try_from(n).ok()).map(Value::Int64)
            }
            FieldType::UInt64 => {
                value.as_integer().and_then(|n| u64::try_from(n).ok()).map(Value::UInt64)
            }
            FieldType::Float32 => match value {
                Value::Float32(v) => Some(Value::Float32(v)),
                other => other.as_exact_f64().and_then(exact_f32).map(Value::Float32),
            },
            FieldType::Float64 => value.as_exact_f64().map(Value::Float64),
        }
    }
}

fn exact_f32(v: f64) -> Option<f32> {
    if v.is_nan() {
        return Some(f32::NAN);
    }
    let narrowed = v as f32;
    (f64::from(narrowed) == v).then_some(narrowed)
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a type name matches no [`FieldType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldType(pub String);

impl fmt::Display for UnknownFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing dtype implementation of {}", self.0)
    }
}

impl std::error::Error for UnknownFieldType {}

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    /// Case-insensitive. `FLOAT` and `DOUBLE` are accepted as aliases of the
    /// 32- and 64-bit float types.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "FLOAT" => return Ok(FieldType::Float32),
            "DOUBLE" => return Ok(FieldType::Float64),
            _ => {}
        }
        FieldType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == upper)
            .ok_or_else(|| UnknownFieldType(s.to_string()))
    }
}

/// Runtime value of a single Slate field.
///
/// Serializes as a bare scalar: `true`/`false` for BOOL, a number otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(BoolWord),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Float32(f32),
}

impl Value {
    /// The field type whose native variant this value is.
    pub const fn field_type(&self) -> FieldType {
        match self {
            Value::Bool(_) => FieldType::Bool,
            Value::Int8(_) => FieldType::Int8,
            Value::UInt8(_) => FieldType::UInt8,
            Value::Int16(_) => FieldType::Int16,
            Value::UInt16(_) => FieldType::UInt16,
            Value::Int32(_) => FieldType::Int32,
            Value::UInt32(_) => FieldType::UInt32,
            Value::Int64(_) => FieldType::Int64,
            Value::UInt64(_) => FieldType::UInt64,
            Value::Float32(_) => FieldType::Float32,
            Value::Float64(_) => FieldType::Float64,
        }
    }

    /// Boolean projection: any non-zero value is `true`.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(word) => word.is_set(),
            Value::Float32(v) => *v != 0.0,
            Value::Float64(v) => *v != 0.0,
            other => other.as_integer().is_some_and(|n| n != 0),
        }
    }

    /// Integer view of the value. Floats qualify only when they hold a whole number.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Bool(word) => Some(i128::from(word.raw())),
            Value::Int8(v) => Some(i128::from(v)),
            Value::UInt8(v) => Some(i128::from(v)),
            Value::Int16(v) => Some(i128::from(v)),
            Value::UInt16(v) => Some(i128::from(v)),
            Value::Int32(v) => Some(i128::from(v)),
            Value::UInt32(v) => Some(i128::from(v)),
            Value::Int64(v) => Some(i128::from(v)),
            Value::UInt64(v) => Some(i128::from(v)),
            Value::Float32(v) => whole_number(f64::from(v)),
            Value::Float64(v) => whole_number(v),
        }
    }

    /// Floating point view of the value when it converts to `f64` without loss.
    pub fn as_exact_f64(&self) -> Option<f64> {
        match *self {
            Value::Bool(_) => None,
            Value::Float32(v) => Some(f64::from(v)),
            Value::Float64(v) => Some(v),
            other => {
                let n = other.as_integer()?;
                let converted = n as f64;
                (converted as i128 == n).then_some(converted)
            }
        }
    }
}

fn whole_number(v: f64) -> Option<i128> {
    // Bounded well inside i128 so the cast below never saturates.
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 1e36).then_some(v as i128)
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(BoolWord::from(value))
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_value_from! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}
