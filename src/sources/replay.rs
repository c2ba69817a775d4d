//! Replay source for recorded captures

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{Interval, interval};
use tracing::debug;

use crate::Result;
use crate::source::CaptureSource;
use crate::types::CapturedRecord;

/// Source that yields a fixed list of records, optionally paced.
pub struct ReplaySource {
    records: VecDeque<CapturedRecord>,
    total: usize,
    pacing: Option<Duration>,
    ticker: Option<Interval>,
}

impl ReplaySource {
    /// Replay `records` as fast as they are consumed.
    pub fn new(records: impl IntoIterator<Item = CapturedRecord>) -> Self {
        let records: VecDeque<CapturedRecord> = records.into_iter().collect();
        let total = records.len();
        Self { records, total, pacing: None, ticker: None }
    }

    /// Emit at most one record per `period`.
    pub fn with_pacing(mut self, period: Duration) -> Self {
        self.pacing = Some(period);
        self
    }

    /// Records not yet yielded.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

#[async_trait::async_trait]
impl CaptureSource for ReplaySource {
    async fn next_record(&mut self) -> Result<Option<CapturedRecord>> {
        if self.records.is_empty() {
            debug!("Reached end of replay ({} records)", self.total);
            return Ok(None);
        }

        if let Some(period) = self.pacing {
            // Created on first use so the source can be built outside a runtime
            self.ticker.get_or_insert_with(|| interval(period)).tick().await;
        }

        Ok(self.records.pop_front())
    }

    fn describe(&self) -> String {
        format!("replay of {} records", self.total)
    }
}
