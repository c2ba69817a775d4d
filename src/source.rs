//! Capture source trait

use crate::Result;
use crate::types::CapturedRecord;

/// Trait for capture record producers
///
/// A source abstracts the capture collaborator: whatever opens the session on the
/// device (a remote `tcpdump` over a shell, a replay file, a test harness) and turns
/// its output into `(destination port, payload)` records in arrival order.
#[async_trait::async_trait]
pub trait CaptureSource: Send + 'static {
    /// Wait for the next captured record
    ///
    /// Returns:
    /// - `Ok(Some(record))` - Next record in arrival order
    /// - `Ok(None)` - Capture ended (normal termination)
    /// - `Err(e)` - The capture stream failed; the caller decides whether to retry
    async fn next_record(&mut self) -> Result<Option<CapturedRecord>>;

    /// Short description for logs
    fn describe(&self) -> String {
        "capture".to_string()
    }
}
