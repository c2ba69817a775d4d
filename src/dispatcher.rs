//! Capture reassembly and dispatch
//!
//! Captured datagrams can arrive below their schema's wire size when the sniffed
//! link fragments them. The [`Reassembler`] joins such fragments back together with
//! a deliberately simple rule:
//!
//! - a short payload on a port with nothing buffered starts a new partial message
//! - a short payload on a port with a partial buffered is a continuation: its first
//!   [`CONTINUATION_HEADER_LEN`] bytes are a repeated lower-layer header and are
//!   dropped before appending
//! - once the buffer reaches the wire size it is released and cleared
//!
//! At most one partial message is in flight per port. The fixed strip length
//! assumes IPv4 without options on the capture path.
//!
//! The [`Dispatcher`] routes each record to the schema bound to its destination port,
//! decodes completed messages and appends them to the [`MessageStore`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::schema::SchemaRegistry;
use crate::store::MessageStore;
use crate::types::{CapturedRecord, DispatchEvent};
use crate::{Result, SlateError};

/// Bytes stripped from the front of every continuation fragment.
pub const CONTINUATION_HEADER_LEN: usize = 20;

/// Outcome of feeding one payload to the [`Reassembler`].
#[derive(Debug, PartialEq, Eq)]
pub enum Assembly<'a> {
    /// A complete message is available (possibly longer than the wire size).
    Complete(Cow<'a, [u8]>),
    /// The payload was buffered; `buffered` bytes are held for the port.
    Pending { buffered: usize },
}

/// Per-port fragment accumulator.
#[derive(Debug, Default)]
pub struct Reassembler {
    partials: HashMap<u16, Vec<u8>>,
}

impl Reassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one payload destined to `port` whose schema has `wire_size` bytes.
    pub fn push<'a>(&mut self, port: u16, payload: &'a [u8], wire_size: usize) -> Assembly<'a> {
        if payload.len() >= wire_size {
            return Assembly::Complete(Cow::Borrowed(payload));
        }

        let Some(buffer) = self.partials.get_mut(&port) else {
            trace!(port, len = payload.len(), "Fragment starts a new partial message");
            self.partials.insert(port, payload.to_vec());
            return Assembly::Pending { buffered: payload.len() };
        };

        let continuation = payload.get(CONTINUATION_HEADER_LEN..).unwrap_or_default();
        buffer.extend_from_slice(continuation);
        trace!(port, buffered = buffer.len(), wire_size, "Fragment appended");

        if buffer.len() >= wire_size {
            let complete = self.partials.remove(&port).unwrap_or_default();
            Assembly::Complete(Cow::Owned(complete))
        } else {
            Assembly::Pending { buffered: buffer.len() }
        }
    }

    /// Bytes currently buffered for `port`.
    pub fn buffered(&self, port: u16) -> usize {
        self.partials.get(&port).map_or(0, Vec::len)
    }

    /// Number of ports with a partial message in flight.
    pub fn in_flight(&self) -> usize {
        self.partials.len()
    }

    /// Drop every partial message.
    pub fn clear(&mut self) {
        self.partials.clear();
    }
}

/// Routes captured records to their service's store.
///
/// Owned by a single capture worker; it is the only writer of the store.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<SchemaRegistry>,
    store: Arc<MessageStore>,
    reassembler: Reassembler,
}

impl Dispatcher {
    /// Create a dispatcher writing into `store`.
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<MessageStore>) -> Self {
        Self { registry, store, reassembler: Reassembler::new() }
    }

    /// Handle one captured record.
    ///
    /// Returns `Ok(Some(event))` when a message was completed and stored, `Ok(None)`
    /// when the record was buffered or addressed to an unwatched port, and an error
    /// when the completed message could not be decoded or stored. Errors concern this
    /// record only.
    pub fn dispatch(&mut self, record: &CapturedRecord) -> Result<Option<DispatchEvent>> {
        let Some(entry) = self.registry.by_port(record.port) else {
            trace!(port = record.port, "No service bound to port, record discarded");
            return Ok(None);
        };

        let schema = &entry.schema;
        let name = schema.service_name();

        let bytes = match self.reassembler.push(record.port, &record.payload, schema.wire_size()) {
            Assembly::Complete(bytes) => bytes,
            Assembly::Pending { buffered } => {
                debug!(
                    service = name,
                    buffered,
                    wire_size = schema.wire_size(),
                    "Received fragmented packet"
                );
                return Ok(None);
            }
        };

        let fields = schema.decode(&bytes)?;
        let id = self.store.insert(name, fields).ok_or_else(|| SlateError::unknown_service(name))?;

        trace!(service = name, id, "Message stored");
        Ok(Some(DispatchEvent { service: Arc::from(name), id }))
    }

    /// Partial messages currently held.
    pub fn in_flight(&self) -> usize {
        self.reassembler.in_flight()
    }

    /// Discard all partial messages.
    pub fn discard_partials(&mut self) {
        self.reassembler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{flag_registry, service};
    use crate::types::{Field, FieldType, Schema, Value};

    #[test]
    fn full_payload_is_complete_immediately() {
        let mut reassembler = Reassembler::new();
        let payload = [7u8; 30];
        assert_eq!(
            reassembler.push(1, &payload, 24),
            Assembly::Complete(Cow::Borrowed(&payload[..]))
        );
        assert_eq!(reassembler.in_flight(), 0);
    }

    #[test]
    fn continuation_strips_the_repeated_header() {
        let mut reassembler = Reassembler::new();
        let first = vec![1u8; 21];
        let mut second = vec![0xEEu8; CONTINUATION_HEADER_LEN];
        second.extend_from_slice(&[2u8; 3]);

        assert_eq!(reassembler.push(9, &first, 24), Assembly::Pending { buffered: 21 });
        match reassembler.push(9, &second, 24) {
            Assembly::Complete(bytes) => {
                assert_eq!(bytes.len(), 24);
                assert_eq!(&bytes[..21], &[1u8; 21]);
                assert_eq!(&bytes[21..], &[2u8; 3]);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(reassembler.buffered(9), 0);
    }

    #[test]
    fn ports_accumulate_independently() {
        let mut reassembler = Reassembler::new();
        reassembler.push(1, &[0u8; 5], 24);
        reassembler.push(2, &[0u8; 6], 24);
        reassembler.push(1, &[0u8; 23], 24);

        assert_eq!(reassembler.buffered(1), 8);
        assert_eq!(reassembler.buffered(2), 6);
        reassembler.clear();
        assert_eq!(reassembler.in_flight(), 0);
    }

    #[test]
    fn tiny_continuation_contributes_nothing() {
        let mut reassembler = Reassembler::new();
        reassembler.push(3, &[1u8; 8], 24);
        assert_eq!(reassembler.push(3, &[9u8; 12], 24), Assembly::Pending { buffered: 8 });
    }

    #[test]
    fn unknown_ports_are_ignored() {
        let (registry, store) = flag_registry(10);
        let mut dispatcher = Dispatcher::new(registry, Arc::clone(&store));

        let event = dispatcher.dispatch(&CapturedRecord::new(1, vec![0u8; 64])).unwrap();
        assert!(event.is_none());
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn complete_record_is_stored() {
        let (registry, store) = flag_registry(10);
        let schema = Arc::clone(registry.schema("frontend_to_control").unwrap());
        let mut dispatcher = Dispatcher::new(registry, Arc::clone(&store));

        let mut message = schema.default_message();
        message[4] = Value::from(true);
        let bytes = schema.encode(&message).unwrap();

        let event = dispatcher.dispatch(&CapturedRecord::new(6250, bytes)).unwrap().unwrap();
        assert_eq!(&*event.service, "frontend_to_control");
        assert_eq!(event.id, 0);

        let stored = store.list_messages("frontend_to_control", None).unwrap();
        assert_eq!(&*stored[0].fields, message.as_slice());
    }

    #[test]
    fn fragments_on_a_second_service_do_not_interfere() {
        let mut registry = SchemaRegistry::new();
        for (name, port) in [("a_to_b", 7000), ("c_to_d", 7001)] {
            let body = vec![Field::new("Payload", FieldType::UInt64)];
            registry.insert(service(name, port), Schema::new(name, body).unwrap());
        }
        let registry = Arc::new(registry);
        let store = Arc::new(MessageStore::new(&registry, 10));
        let mut dispatcher = Dispatcher::new(registry, Arc::clone(&store));

        // Wire size is 28; both ports get a 26 byte first fragment.
        dispatcher.dispatch(&CapturedRecord::new(7000, vec![0u8; 26])).unwrap();
        dispatcher.dispatch(&CapturedRecord::new(7001, vec![0u8; 26])).unwrap();
        assert_eq!(dispatcher.in_flight(), 2);

        let mut continuation = vec![0u8; CONTINUATION_HEADER_LEN];
        continuation.extend_from_slice(&[0u8; 2]);
        let event = dispatcher.dispatch(&CapturedRecord::new(7001, continuation)).unwrap();

        assert_eq!(event.map(|e| e.service.to_string()), Some("c_to_d".to_string()));
        assert_eq!(dispatcher.in_flight(), 1);
        assert!(store.list_messages("a_to_b", None).unwrap().is_empty());
    }

    #[test]
    fn overlong_reassembly_decodes_the_wire_size_prefix() {
        let (registry, store) = flag_registry(10);
        let schema = Arc::clone(registry.schema("frontend_to_control").unwrap());
        let mut dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&store));
        let message = crate::test_utils::flag_message(&registry, true);

        // 22 buffered plus 3 appended overshoots the 24 byte wire size
        let first = message[..22].to_vec();
        let mut continuation = vec![0xEEu8; CONTINUATION_HEADER_LEN];
        continuation.extend_from_slice(&message[22..]);
        continuation.push(0xAB);
        let mut joined = first.clone();
        joined.extend_from_slice(&continuation[CONTINUATION_HEADER_LEN..]);
        assert_eq!(joined.len(), 25);

        assert!(dispatcher.dispatch(&CapturedRecord::new(6250, first)).unwrap().is_none());
        let event = dispatcher.dispatch(&CapturedRecord::new(6250, continuation)).unwrap();
        assert_eq!(event.map(|e| e.id), Some(0));

        let stored = store.list_messages("frontend_to_control", None).unwrap();
        assert_eq!(&*stored[0].fields, schema.decode(&joined[..24]).unwrap().as_slice());
        assert_eq!(stored[0].fields[4], Value::from(true));
        assert_eq!(dispatcher.in_flight(), 0);

        // The next short record starts a fresh partial and keeps all of its bytes
        let next = dispatcher.dispatch(&CapturedRecord::new(6250, vec![3u8; 22])).unwrap();
        assert!(next.is_none());
        assert_eq!(dispatcher.reassembler.buffered(6250), 22);
        assert_eq!(dispatcher.in_flight(), 1);
    }
}
