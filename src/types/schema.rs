//! Slate schema types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{FieldType, Value};
use crate::codec::Codec;
use crate::{Result, SlateError};

/// A named, typed field of a Slate message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name, unique within its schema
    pub name: String,
    /// Wire type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type }
    }
}

/// Header fields present at the start of every Slate message, in wire order.
pub const HEADER_FIELDS: [(&str, FieldType); 4] = [
    ("BwpType", FieldType::UInt32),
    ("Crc", FieldType::UInt32),
    ("Seq", FieldType::UInt64),
    ("Frame", FieldType::UInt32),
];

/// Complete wire description of one service's messages: the fixed header
/// followed by the service-specific body.
///
/// Built once at load time and shared read-only (usually behind an `Arc`).
#[derive(Debug, Clone)]
pub struct Schema {
    service_name: String,
    fields: Vec<Field>,
    codec: Codec,
}

impl Schema {
    /// Build a schema from body fields, prepending the standard header.
    ///
    /// Fails if any two fields share a name once header and body are flattened.
    pub fn new(service_name: impl Into<String>, body: Vec<Field>) -> Result<Self> {
        let service_name = service_name.into();

        let mut fields: Vec<Field> =
            HEADER_FIELDS.iter().map(|(name, ty)| Field::new(*name, *ty)).collect();
        fields.extend(body);

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SlateError::Parse {
                    context: format!("Schema for {service_name}"),
                    details: format!("Field name '{}' is declared more than once", field.name),
                });
            }
        }

        let codec = Codec::new(service_name.clone(), &fields);
        Ok(Self { service_name, fields, codec })
    }

    /// Name of the service this schema describes.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// All fields, header first.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The four header fields.
    pub fn header(&self) -> &[Field] {
        &self.fields[..HEADER_FIELDS.len()]
    }

    /// The service-specific body fields.
    pub fn body(&self) -> &[Field] {
        &self.fields[HEADER_FIELDS.len()..]
    }

    /// The codec bound to this layout.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Size of one message on the wire.
    pub fn wire_size(&self) -> usize {
        self.codec.wire_size()
    }

    /// Decode one message. See [`Codec::decode`].
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Value>> {
        self.codec.decode(data)
    }

    /// Encode one message. See [`Codec::encode`].
    pub fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        self.codec.encode(values)
    }

    /// Position of a field by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Look up a field's value in a decoded message by name.
    pub fn field<'a>(&self, values: &'a [Value], name: &str) -> Option<&'a Value> {
        self.index_of(name).and_then(|index| values.get(index))
    }

    /// A message with every field at its zero value.
    pub fn default_message(&self) -> Vec<Value> {
        self.fields.iter().map(|field| field.field_type.default_value()).collect()
    }
}
