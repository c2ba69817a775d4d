//! Error types for Slate protocol processing.
//!
//! Every fallible operation in the crate returns [`SlateError`]. The variants map
//! onto the failure classes the engine distinguishes at runtime:
//!
//! - **Schema errors**: a schema file line that could not be interpreted. These are
//!   logged and the line is skipped; loading continues.
//! - **Short buffers**: a decode attempt on fewer bytes than the schema's wire size.
//!   Fatal to that one decode only.
//! - **Unknown service / port**: an operation addressed to something with no bound schema.
//! - **Transport errors**: a failed connect or write during injection. Always returned
//!   to the caller, never fatal to the process.
//! - **Encode errors**: a value vector that does not fit the schema (wrong arity or a
//!   value that is not representable in its field's width).
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use slatewire::SlateError;
//!
//! let error = SlateError::transport_failed("frontend_to_control", "connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Slate operations.
pub type Result<T, E = SlateError> = std::result::Result<T, E>;

/// Main error type for Slate operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SlateError {
    #[error("Schema error in {file} at line \"{line}\": {reason}")]
    Schema { file: PathBuf, line: String, reason: String },

    #[error("Received data is too short for slate {service}: {actual} < {required}")]
    ShortBuffer { service: String, actual: usize, required: usize },

    #[error("Service \"{name}\" is not configured")]
    UnknownService { name: String },

    #[error("No service is bound to port {port}")]
    UnknownPort { port: u16 },

    #[error("Transport error for service {service}: {reason}")]
    Transport {
        service: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot encode message for {service}: {details}")]
    Encode { service: String, details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Capture stream error: {reason}")]
    Capture {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl SlateError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SlateError::Transport { .. } => true,
            SlateError::Capture { .. } => true,
            SlateError::Schema { .. } => false,
            SlateError::ShortBuffer { .. } => false,
            SlateError::UnknownService { .. } => false,
            SlateError::UnknownPort { .. } => false,
            SlateError::Encode { .. } => false,
            SlateError::File { .. } => false,
            SlateError::Parse { .. } => false,
            SlateError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SlateError::Schema { .. } => vec![
                "Check the field type spelling against the supported types",
                "Verify each field line has the form `<name> <TYPE>`",
                "Check %include directives for cycles",
            ],
            SlateError::ShortBuffer { .. } => vec![
                "Check the schema field list matches the captured service",
                "Verify the capture is not truncated by the snap length",
            ],
            SlateError::UnknownService { .. } => vec![
                "Check the service name spelling",
                "Verify the service exists in the service directory",
                "Verify a schema file exists for the service",
            ],
            SlateError::UnknownPort { .. } => vec![
                "Check the port mapping in the service directory",
                "Verify the capture filter only selects configured ports",
            ],
            SlateError::Transport { .. } => vec![
                "Verify the tunnel to the device is open",
                "Check that the target port is reachable",
                "Retry the injection",
            ],
            SlateError::Encode { .. } => vec![
                "Provide exactly one value per schema field, header included",
                "Check each value fits in its field's width",
            ],
            SlateError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            SlateError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            SlateError::Capture { .. } => vec![
                "Check the capture session on the device is still running",
                "Restart the capture",
            ],
            SlateError::Config { .. } => vec![
                "Check the configuration values",
                "Remove the offending key to fall back to its default",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SlateError::File { path, source }
    }

    /// Helper constructor for schema line errors.
    pub fn schema_error(
        file: impl Into<PathBuf>,
        line: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SlateError::Schema { file: file.into(), line: line.into(), reason: reason.into() }
    }

    /// Helper constructor for short buffer errors.
    pub fn short_buffer(service: impl Into<String>, actual: usize, required: usize) -> Self {
        SlateError::ShortBuffer { service: service.into(), actual, required }
    }

    /// Helper constructor for unknown service errors.
    pub fn unknown_service(name: impl Into<String>) -> Self {
        SlateError::UnknownService { name: name.into() }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(service: impl Into<String>, reason: impl Into<String>) -> Self {
        SlateError::Transport { service: service.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        service: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SlateError::Transport {
            service: service.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for encode errors.
    pub fn encode_error(service: impl Into<String>, details: impl Into<String>) -> Self {
        SlateError::Encode { service: service.into(), details: details.into() }
    }

    /// Helper constructor for capture stream errors.
    pub fn capture_failed(reason: impl Into<String>) -> Self {
        SlateError::Capture { reason: reason.into(), source: None }
    }

    /// Helper constructor for capture stream errors with source.
    pub fn capture_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SlateError::Capture { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for SlateError {
    fn from(err: std::io::Error) -> Self {
        SlateError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
