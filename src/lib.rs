//! Schema-driven engine for the Slate fixed-layout binary protocol.
//!
//! Slatewire turns a directory of plain-text schema files into typed codecs,
//! watches captured traffic for the configured services, reassembles fragmented
//! datagrams and keeps a bounded, incrementally queryable history per service.
//! It can also encode and inject messages into a live service.
//!
//! # Features
//!
//! - **Schemas**: one text file per service, `%include` splicing, fixed 20-byte header
//! - **Codec**: big-endian fixed layout, short-input and overrun handling
//! - **Capture**: pluggable [`CaptureSource`]s, including a libpcap stream reader
//! - **History**: per-service bounded stores with `last_id` polling
//! - **Injection**: TCP or UDP transports behind the [`Transport`] trait
//!
//! # Example
//!
//! ```rust,no_run
//! use slatewire::{Slate, SlateConfig};
//! use slatewire::sources::PcapSource;
//!
//! #[tokio::main]
//! async fn main() -> slatewire::Result<()> {
//!     let config = SlateConfig::load("slate.yaml")?;
//!     let mut sniffer = Slate::sniffer(&config)?;
//!
//!     // Run `sniffer.capture_command(..)` on the device and feed its stdout here.
//!     let capture = tokio::io::empty();
//!     sniffer.start(PcapSource::new(capture).await?).await;
//!
//!     let mut last_id = None;
//!     for message in sniffer.list_messages("frontend_to_control", last_id).unwrap_or_default() {
//!         println!("{}: {:?}", message.id, message.fields);
//!         last_id = Some(message.id);
//!     }
//!
//!     sniffer.stop().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod codec;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Schema loading and message history
pub mod config;
pub mod dispatcher;
pub mod schema;
pub mod store;

// Capture and injection
pub mod driver;
pub mod injector;
pub mod sniffer;
pub mod source;
pub mod sources;

// Core exports
pub use error::*;
pub use types::*;

pub use codec::Codec;
pub use config::{InjectionProtocol, SlateConfig};
pub use dispatcher::{Dispatcher, Reassembler};
pub use driver::{Driver, DriverHandle, StatsSnapshot};
pub use injector::{Injector, TcpTransport, Transport, UdpTransport};
pub use schema::{SchemaLoader, SchemaRegistry, ServiceDirectory};
pub use sniffer::Sniffer;
pub use source::CaptureSource;
pub use store::{MessageStore, ServiceStore};

use std::sync::Arc;
use tracing::info;

/// Unified entry point building the engine from a [`SlateConfig`].
///
/// # Examples
///
/// ```rust,no_run
/// use slatewire::{Slate, SlateConfig, Value};
///
/// # #[tokio::main]
/// # async fn main() -> slatewire::Result<()> {
/// let config = SlateConfig::default();
/// let injector = Slate::injector(&config)?;
///
/// let registry = Slate::registry(&config)?;
/// let mut message = registry.schema("frontend_to_control").unwrap().default_message();
/// message[4] = Value::from(true);
/// injector.send("frontend_to_control", &message).await?;
/// # Ok(())
/// # }
/// ```
pub struct Slate;

impl Slate {
    /// Load the service directory and every service schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the service directory cannot be read or parsed. Services
    /// whose schema cannot be loaded are skipped with a warning instead.
    pub fn registry(config: &SlateConfig) -> Result<Arc<SchemaRegistry>> {
        let directory = ServiceDirectory::load(&config.service_directory)?;
        let registry = SchemaRegistry::load(&directory, &config.schema_dir);
        Ok(Arc::new(registry))
    }

    /// Build a stopped [`Sniffer`] over all configured services.
    pub fn sniffer(config: &SlateConfig) -> Result<Sniffer> {
        config.validate()?;
        let registry = Self::registry(config)?;
        info!(
            "Sniffer ready for {} services, capture with: {}",
            registry.len(),
            sources::capture_command(&config.capture.interface, &registry.ports())
        );
        Ok(Sniffer::new(registry, config.store_capacity))
    }

    /// Build an [`Injector`] using the configured transport.
    pub fn injector(config: &SlateConfig) -> Result<Injector> {
        config.validate()?;
        let registry = Self::registry(config)?;
        Ok(Injector::new(registry, config.injection.transport()))
    }
}
