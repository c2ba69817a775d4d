//! Core types for Slate message representation.
//!
//! ## Architecture
//!
//! - [`FieldType`] is the closed set of primitive wire types, each with a fixed width
//! - [`Value`] holds one decoded field; BOOL fields keep their raw word in a [`BoolWord`]
//! - [`Field`] and [`Schema`] describe a service's layout: the fixed header
//!   (`BwpType`, `Crc`, `Seq`, `Frame`) followed by the body loaded from its schema file
//! - [`Service`] is one entry of the service directory
//! - [`CapturedRecord`] is the unit a capture source yields, [`StoredMessage`] the unit
//!   the store retains
//!
//! ## Usage Example
//!
//! ```rust
//! use slatewire::types::{Field, FieldType, Schema, Value};
//!
//! let schema = Schema::new("frontend_to_control", vec![Field::new("Flag", FieldType::Bool)])?;
//! let mut message = schema.default_message();
//! message[0] = Value::UInt32(288);
//!
//! let bytes = schema.encode(&message)?;
//! assert_eq!(bytes.len(), schema.wire_size());
//! assert_eq!(schema.decode(&bytes)?, message);
//! # Ok::<(), slatewire::SlateError>(())
//! ```

mod bool_word;
mod field_type;
mod message;
mod schema;
mod service;

pub use bool_word::BoolWord;
pub use field_type::{FieldType, UnknownFieldType, Value};
pub use message::{CapturedRecord, DispatchEvent, StoredMessage};
pub use schema::{Field, HEADER_FIELDS, Schema};
pub use service::Service;
