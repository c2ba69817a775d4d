//! Service directory parsing
//!
//! Two formats are accepted:
//!
//! - the structured mapping (usually `service_directory.json`):
//!
//!   ```text
//!   { "frontend_to_control": { "host": "192.168.100.1", "port": 6250,
//!                              "sender": "frontend", "receiver": "control", "crc": 610193511 } }
//!   ```
//!
//!   JSON is read through the YAML parser, so the same mapping written as YAML works too.
//!
//! - the plain listing, one `name host port` per line. Sender and receiver come from
//!   splitting the name on `_to_`; the crc is left at 0 to be filled in by hand.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use super::content_lines;
use crate::types::Service;
use crate::{Result, SlateError};

#[derive(Debug, Deserialize)]
struct ServiceSpec {
    host: String,
    port: u16,
    sender: String,
    receiver: String,
    #[serde(default)]
    crc: u32,
}

/// The set of known services, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDirectory {
    services: Vec<Service>,
}

impl ServiceDirectory {
    /// Build a directory from services; later duplicates of a name are dropped.
    pub fn new(mut services: Vec<Service>) -> Self {
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services.dedup_by(|later, earlier| later.name == earlier.name);
        Self { services }
    }

    /// Parse the structured mapping format (JSON or YAML).
    pub fn from_json_str(text: &str) -> Result<Self> {
        let specs: BTreeMap<String, ServiceSpec> =
            serde_yaml_ng::from_str(text).map_err(|e| SlateError::Parse {
                context: "Service directory".to_string(),
                details: e.to_string(),
            })?;

        let services = specs
            .into_iter()
            .map(|(name, spec)| Service {
                name,
                host: spec.host,
                port: spec.port,
                sender: spec.sender,
                receiver: spec.receiver,
                crc: spec.crc,
            })
            .collect();
        Ok(Self::new(services))
    }

    /// Parse the plain `name host port` listing.
    ///
    /// Lines that do not parse are skipped with a warning.
    pub fn from_listing(text: &str) -> Self {
        let services = content_lines(text)
            .filter_map(|line| match parse_listing_line(line) {
                Some(service) => Some(service),
                None => {
                    warn!("Skipping malformed service line \"{}\"", line);
                    None
                }
            })
            .collect();
        Self::new(services)
    }

    /// Read a directory file. Files ending in `.json`, `.yaml` or `.yml` use the
    /// structured format, anything else the plain listing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| SlateError::file_error(path.to_path_buf(), source))?;

        let structured = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "json" | "yaml" | "yml"));

        let directory =
            if structured { Self::from_json_str(&text)? } else { Self::from_listing(&text) };

        debug!("{} services parsed from {}", directory.len(), path.display());
        Ok(directory)
    }

    /// Look up a service by name.
    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services
            .binary_search_by(|service| service.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.services[index])
    }

    /// Iterate over services in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn parse_listing_line(line: &str) -> Option<Service> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    let host = tokens.next()?;
    let port = tokens.next()?.parse::<u16>().ok()?;
    let (sender, receiver) = name.split_once("_to_")?;

    Some(Service {
        name: name.to_string(),
        host: host.to_string(),
        port,
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        crc: 0,
    })
}
