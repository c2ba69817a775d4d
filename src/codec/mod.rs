//! Fixed-layout binary codec for Slate messages.
//!
//! A [`Codec`] is derived once from an ordered field list. Field offsets are the
//! running sum of the widths before them, so the layout is fully determined by the
//! field order; all values are big-endian.
//!
//! ```rust
//! use slatewire::codec::Codec;
//! use slatewire::{Field, FieldType, Value};
//!
//! let fields = vec![Field::new("Count", FieldType::UInt16), Field::new("On", FieldType::Bool)];
//! let codec = Codec::new("demo", &fields);
//! assert_eq!(codec.wire_size(), 6);
//!
//! let bytes = codec.encode(&[Value::UInt16(3), Value::from(true)]).unwrap();
//! assert_eq!(bytes, vec![0, 3, 0, 0, 0, 1]);
//! assert_eq!(codec.decode(&bytes).unwrap(), vec![Value::UInt16(3), Value::from(true)]);
//! ```

mod wire;

pub use wire::{WirePrimitive, read_value, write_value};

use tracing::debug;

use crate::types::{Field, FieldType, Value};
use crate::{Result, SlateError};

/// One field's position in the wire layout.
#[derive(Debug, Clone)]
struct Slot {
    name: String,
    field_type: FieldType,
    offset: usize,
}

/// Pack/unpack routine for one fixed wire layout.
#[derive(Debug, Clone)]
pub struct Codec {
    service: String,
    layout: Vec<Slot>,
    wire_size: usize,
}

impl Codec {
    /// Derive the layout for `fields`, in order.
    pub fn new(service: impl Into<String>, fields: &[Field]) -> Self {
        let mut offset = 0;
        let layout = fields
            .iter()
            .map(|field| {
                let slot =
                    Slot { name: field.name.clone(), field_type: field.field_type, offset };
                offset += field.field_type.size();
                slot
            })
            .collect();

        Self { service: service.into(), layout, wire_size: offset }
    }

    /// Total size of one message on the wire.
    pub fn wire_size(&self) -> usize {
        self.wire_size
    }

    /// Number of fields in the layout.
    pub fn field_count(&self) -> usize {
        self.layout.len()
    }

    /// Byte offset of the field at `index`.
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        self.layout.get(index).map(|slot| slot.offset)
    }

    /// Unpack one message.
    ///
    /// Fails with [`SlateError::ShortBuffer`] when `data` is shorter than the wire
    /// size. Bytes past the wire size are ignored; captured frames sometimes carry
    /// trailing padding.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Value>> {
        if data.len() < self.wire_size {
            return Err(SlateError::short_buffer(&self.service, data.len(), self.wire_size));
        }
        if data.len() > self.wire_size {
            debug!(
                service = %self.service,
                slate_size = self.wire_size,
                message_size = data.len(),
                "Message is too long, trailing bytes ignored"
            );
        }

        let frame = &data[..self.wire_size];
        self.layout
            .iter()
            .map(|slot| {
                read_value(frame, slot.offset, slot.field_type).ok_or_else(|| {
                    SlateError::short_buffer(&self.service, frame.len(), slot.offset)
                })
            })
            .collect()
    }

    /// Pack one message, fields in declared order.
    ///
    /// Each value is converted to its field's type first (see [`FieldType::coerce`]);
    /// a value that does not fit, or a value count that differs from the field count,
    /// fails with [`SlateError::Encode`]. The output is exactly `wire_size()` bytes.
    pub fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        if values.len() != self.layout.len() {
            return Err(SlateError::encode_error(
                &self.service,
                format!("expected {} values, got {}", self.layout.len(), values.len()),
            ));
        }

        let mut out = Vec::with_capacity(self.wire_size);
        for (slot, value) in self.layout.iter().zip(values) {
            let coerced = slot.field_type.coerce(*value).ok_or_else(|| {
                SlateError::encode_error(
                    &self.service,
                    format!(
                        "value {:?} does not fit field {} ({})",
                        value, slot.name, slot.field_type
                    ),
                )
            })?;
            write_value(coerced, &mut out);
        }

        debug_assert_eq!(out.len(), self.wire_size);
        Ok(out)
    }
}
