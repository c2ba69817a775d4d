//! Big-endian wire primitives

use crate::types::{BoolWord, FieldType, Value};

/// A fixed-width primitive that can be read from and written to the wire.
pub trait WirePrimitive: Sized + Copy {
    /// Width in bytes.
    const WIDTH: usize;

    /// Read a value from the first `WIDTH` big-endian bytes of `bytes`.
    fn read_be(bytes: &[u8]) -> Option<Self>;

    /// Append the big-endian encoding of this value.
    fn write_be(self, out: &mut Vec<u8>);
}

macro_rules! impl_wire_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WirePrimitive for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn read_be(bytes: &[u8]) -> Option<Self> {
                    let raw = bytes.get(..Self::WIDTH)?.try_into().ok()?;
                    Some(<$ty>::from_be_bytes(raw))
                }

                fn write_be(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }
            }
        )*
    };
}

impl_wire_primitive!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

fn read<T: WirePrimitive>(data: &[u8], offset: usize) -> Option<T> {
    T::read_be(data.get(offset..)?)
}

/// Read one field of type `field_type` at `offset`.
///
/// Returns `None` when the field would run past the end of `data`.
pub fn read_value(data: &[u8], offset: usize, field_type: FieldType) -> Option<Value> {
    let value = match field_type {
        FieldType::Bool => Value::Bool(BoolWord(read::<u32>(data, offset)?)),
        FieldType::Int8 => Value::Int8(read(data, offset)?),
        FieldType::UInt8 => Value::UInt8(read(data, offset)?),
        FieldType::Int16 => Value::Int16(read(data, offset)?),
        FieldType::UInt16 => Value::UInt16(read(data, offset)?),
        FieldType::Int32 => Value::Int32(read(data, offset)?),
        FieldType::UInt32 => Value::UInt32(read(data, offset)?),
        FieldType::Int64 => Value::Int64(read(data, offset)?),
        FieldType::UInt64 => Value::UInt64(read(data, offset)?),
        FieldType::Float32 => Value::Float32(read(data, offset)?),
        FieldType::Float64 => Value::Float64(read(data, offset)?),
    };
    Some(value)
}

/// Append the big-endian encoding of `value`.
pub fn write_value(value: Value, out: &mut Vec<u8>) {
    match value {
        Value::Bool(word) => word.raw().write_be(out),
        Value::Int8(v) => v.write_be(out),
        Value::UInt8(v) => v.write_be(out),
        Value::Int16(v) => v.write_be(out),
        Value::UInt16(v) => v.write_be(out),
        Value::Int32(v) => v.write_be(out),
        Value::UInt32(v) => v.write_be(out),
        Value::Int64(v) => v.write_be(out),
        Value::UInt64(v) => v.write_be(out),
        Value::Float32(v) => v.write_be(out),
        Value::Float64(v) => v.write_be(out),
    }
}
