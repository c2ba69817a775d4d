//! Test utilities shared by unit tests and benches
//!
//! Fixtures are built in memory or in a throwaway directory, so nothing here
//! depends on files checked into the repository.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::{Arc, Mutex, PoisonError};

use crate::injector::Transport;
use crate::schema::SchemaRegistry;
use crate::source::CaptureSource;
use crate::store::MessageStore;
use crate::types::{CapturedRecord, Field, FieldType, Schema, Service, Value};
use crate::{Result, SlateError};

/// Name of the service used by [`flag_registry`].
pub const FLAG_SERVICE: &str = "frontend_to_control";

/// Port of the service used by [`flag_registry`].
pub const FLAG_PORT: u16 = 6250;

/// Scratch directory for fixture files, removed on drop.
#[cfg(test)]
#[derive(Debug)]
pub struct TempDir {
    dir: tempfile::TempDir,
}

#[cfg(test)]
impl TempDir {
    /// Create a fresh, empty directory. `label` only makes the name readable.
    pub fn new(label: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("slatewire-{label}-"))
            .tempdir()
            .expect("create temp dir");
        Self { dir }
    }

    /// Write `contents` to `name` inside the directory and return its path.
    pub fn write(&self, name: &str, contents: &str) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write temp file");
        path
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

/// A service on the loopback host; sender and receiver are derived from the name.
pub fn service(name: &str, port: u16) -> Service {
    let (sender, receiver) = name.split_once("_to_").unwrap_or((name, name));
    Service {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port,
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        crc: 0,
    }
}

/// Registry with the single `frontend_to_control` service (body `Flag BOOL`, port
/// 6250) and a store for it.
pub fn flag_registry(capacity: usize) -> (Arc<SchemaRegistry>, Arc<MessageStore>) {
    let mut registry = SchemaRegistry::new();
    let schema = Schema::new(FLAG_SERVICE, vec![Field::new("Flag", FieldType::Bool)])
        .expect("flag schema is valid");
    registry.insert(service(FLAG_SERVICE, FLAG_PORT), schema);

    let registry = Arc::new(registry);
    let store = Arc::new(MessageStore::new(&registry, capacity));
    (registry, store)
}

/// Encoded `frontend_to_control` message with a zero header.
pub fn flag_message(registry: &SchemaRegistry, flag: bool) -> Vec<u8> {
    let schema = registry.schema(FLAG_SERVICE).expect("flag service registered");
    let mut values = schema.default_message();
    values[4] = Value::from(flag);
    schema.encode(&values).expect("flag message encodes")
}

/// Source that fails on every read.
pub struct FailingSource<F> {
    make_error: F,
}

impl<F> FailingSource<F>
where
    F: Fn() -> SlateError + Send + 'static,
{
    pub fn new(make_error: F) -> Self {
        Self { make_error }
    }
}

#[async_trait::async_trait]
impl<F> CaptureSource for FailingSource<F>
where
    F: Fn() -> SlateError + Send + 'static,
{
    async fn next_record(&mut self) -> Result<Option<CapturedRecord>> {
        Err((self.make_error)())
    }
}

/// Transport recording every payload as `(port, bytes)`.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<(u16, Vec<u8>)>>,
}

impl MemoryTransport {
    pub fn sent(&self) -> Vec<(u16, Vec<u8>)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, service: &Service, payload: &[u8]) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((service.port, payload.to_vec()));
        Ok(())
    }
}

/// IPv4 packet carrying one UDP datagram to `port`.
pub fn ipv4_udp_frame(port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let total_len = 20 + udp_len;

    let mut packet = Vec::with_capacity(total_len);
    packet.extend_from_slice(&[0x45, 0x00]);
    packet.extend_from_slice(&(total_len as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 64, 17, 0x00, 0x00]);
    packet.extend_from_slice(&[192, 168, 100, 2]);
    packet.extend_from_slice(&[192, 168, 100, 1]);

    packet.extend_from_slice(&40000u16.to_be_bytes());
    packet.extend_from_slice(&port.to_be_bytes());
    packet.extend_from_slice(&(udp_len as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00]);
    packet.extend_from_slice(payload);
    packet
}

/// Builds a microsecond libpcap stream in memory.
#[derive(Debug)]
pub struct PcapWriter {
    big_endian: bool,
    bytes: Vec<u8>,
    frames: u32,
}

impl PcapWriter {
    pub fn new(big_endian: bool, link_type: u32) -> Self {
        let mut writer = Self { big_endian, bytes: Vec::new(), frames: 0 };
        writer.u32(0xA1B2_C3D4);
        writer.u16(2);
        writer.u16(4);
        writer.u32(0);
        writer.u32(0);
        writer.u32(65535);
        writer.u32(link_type);
        writer
    }

    /// Append one captured frame.
    pub fn frame(&mut self, data: &[u8]) -> &mut Self {
        self.frames += 1;
        self.u32(1_700_000_000);
        self.u32(self.frames);
        self.u32(data.len() as u32);
        self.u32(data.len() as u32);
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    fn u16(&mut self, value: u16) {
        let bytes = if self.big_endian { value.to_be_bytes() } else { value.to_le_bytes() };
        self.bytes.extend_from_slice(&bytes);
    }

    fn u32(&mut self, value: u32) {
        let bytes = if self.big_endian { value.to_be_bytes() } else { value.to_le_bytes() };
        self.bytes.extend_from_slice(&bytes);
    }
}
