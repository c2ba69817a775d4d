//! Service directory entry types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical Slate channel bound to one port on the device.
///
/// `name` is the key shared with the schema files and the message store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    /// Service name, e.g. `frontend_to_control`
    pub name: String,
    /// Host the receiving process listens on
    pub host: String,
    /// Destination port of the service's datagrams
    pub port: u16,
    /// Name of the sending process
    pub sender: String,
    /// Name of the receiving process
    pub receiver: String,
    /// Expected value of the header `Crc` field
    pub crc: u32,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}:{}", self.name, self.host, self.port)
    }
}
