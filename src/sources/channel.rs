//! Channel source fed by an external capture collaborator

use tokio::sync::mpsc;

use crate::Result;
use crate::source::CaptureSource;
use crate::types::CapturedRecord;

/// Source backed by an mpsc channel.
///
/// The capture collaborator keeps the [`ChannelFeed`] and pushes records as they
/// arrive; the capture ends once every feed handle is dropped.
pub struct ChannelSource {
    receiver: mpsc::Receiver<CapturedRecord>,
}

/// Sending half handed to the capture collaborator.
pub type ChannelFeed = mpsc::Sender<CapturedRecord>;

impl ChannelSource {
    /// Create a source and its feed, buffering up to `capacity` records.
    pub fn new(capacity: usize) -> (ChannelFeed, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self { receiver })
    }
}

#[async_trait::async_trait]
impl CaptureSource for ChannelSource {
    async fn next_record(&mut self) -> Result<Option<CapturedRecord>> {
        Ok(self.receiver.recv().await)
    }

    fn describe(&self) -> String {
        "channel feed".to_string()
    }
}
