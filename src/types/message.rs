//! Captured record and stored message types

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::Value;

/// One datagram handed over by a capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    /// Destination port of the datagram
    pub port: u16,
    /// Transport payload, exactly as captured
    pub payload: Vec<u8>,
}

impl CapturedRecord {
    /// Create a new captured record.
    pub fn new(port: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self { port, payload: payload.into() }
    }
}

/// A decoded message retained in a service's history.
///
/// `id` is assigned by the owning store at insertion and is unrelated to the
/// wire-level `Seq` header field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned identifier, strictly increasing per service
    pub id: u64,
    /// Field values, header first (shared, never mutated)
    pub fields: Arc<[Value]>,
}

impl StoredMessage {
    /// Create a new stored message.
    pub fn new(id: u64, fields: Vec<Value>) -> Self {
        Self { id, fields: fields.into() }
    }
}

/// Notification that a completed message was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    /// Service the message belongs to
    pub service: Arc<str>,
    /// Id the store assigned to it
    pub id: u64,
}
