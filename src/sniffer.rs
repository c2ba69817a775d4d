//! Running capture and store query boundary

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;
use crate::driver::{Driver, DriverHandle, DriverStats, StatsSnapshot};
use crate::schema::SchemaRegistry;
use crate::source::CaptureSource;
use crate::sources::capture_command;
use crate::store::MessageStore;
use crate::types::{DispatchEvent, Field, Service, StoredMessage};

/// Owns the message store and at most one running capture feeding it.
///
/// The store outlives individual captures: stopping and restarting keeps the
/// history and ids keep increasing.
pub struct Sniffer {
    registry: Arc<SchemaRegistry>,
    store: Arc<MessageStore>,
    run: Option<DriverHandle>,
    last_stats: Arc<DriverStats>,
}

impl Sniffer {
    /// Create a stopped sniffer with one store of `capacity` messages per service.
    pub fn new(registry: Arc<SchemaRegistry>, capacity: usize) -> Self {
        let store = Arc::new(MessageStore::new(&registry, capacity));
        Self { registry, store, run: None, last_stats: Arc::default() }
    }

    /// Start capturing from `source`, stopping any capture already running.
    pub async fn start<S: CaptureSource>(&mut self, source: S) {
        self.stop().await;

        info!("Starting capture on {} for {} services", source.describe(), self.registry.len());
        let dispatcher = Dispatcher::new(Arc::clone(&self.registry), Arc::clone(&self.store));
        let handle = Driver::spawn(source, dispatcher);
        self.last_stats = Arc::clone(&handle.stats);
        self.run = Some(handle);
    }

    /// Stop the running capture and wait for it to exit.
    ///
    /// Messages already dispatched stay in the store. Returns the final counters
    /// of the stopped run, or `None` when nothing was running.
    pub async fn stop(&mut self) -> Option<StatsSnapshot> {
        let handle = self.run.take()?;
        let stats = Arc::clone(&handle.stats);
        handle.stop().await;

        let snapshot = stats.snapshot();
        debug!(?snapshot, "Capture stopped");
        Some(snapshot)
    }

    /// Whether a capture is running. A capture whose source ended counts as stopped.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(DriverHandle::is_running)
    }

    /// Counters of the current run, or of the last one.
    pub fn stats(&self) -> StatsSnapshot {
        self.last_stats.snapshot()
    }

    /// Dispatch events of the current run.
    ///
    /// Intermediate events may be skipped when the consumer is slower than the
    /// capture; poll [`list_messages`](Self::list_messages) for the full history.
    /// The stream ends with the run. Without a running capture it is empty.
    pub fn updates(&self) -> BoxStream<'static, Arc<DispatchEvent>> {
        match &self.run {
            Some(handle) => WatchStream::from_changes(handle.events.clone())
                .take_while(|event| futures::future::ready(event.is_some()))
                .filter_map(|event| async move { event })
                .boxed(),
            None => stream::empty().boxed(),
        }
    }

    /// Messages of `service` newer than `last_id`; `None` for an unknown service.
    pub fn list_messages(&self, service: &str, last_id: Option<u64>) -> Option<Vec<StoredMessage>> {
        self.store.list_messages(service, last_id)
    }

    /// Field list of `service`, header first; `None` for an unknown service.
    pub fn get_schema(&self, service: &str) -> Option<&[Field]> {
        self.store.get_schema(service)
    }

    /// Configured services with a loaded schema, in name order.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.registry.iter().map(|entry| &entry.service)
    }

    /// Remote command producing a pcap stream for every watched port.
    pub fn capture_command(&self, interface: &str) -> String {
        capture_command(interface, &self.registry.ports())
    }

    /// The schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// The message store.
    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }
}

impl Drop for Sniffer {
    fn drop(&mut self) {
        if let Some(handle) = &self.run {
            debug!("Dropping sniffer, cancelling capture");
            handle.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ChannelSource, ReplaySource};
    use crate::test_utils::{flag_message, flag_registry};
    use crate::types::CapturedRecord;

    #[tokio::test]
    async fn history_survives_a_restart() {
        let (registry, _) = flag_registry(10);
        let mut sniffer = Sniffer::new(Arc::clone(&registry), 10);
        assert!(!sniffer.is_running());
        assert!(sniffer.stop().await.is_none());

        let first = vec![CapturedRecord::new(6250, flag_message(&registry, true))];
        sniffer.start(ReplaySource::new(first)).await;
        let stats = sniffer.stop().await;
        assert!(stats.is_some());

        let (feed, source) = ChannelSource::new(4);
        sniffer.start(source).await;
        assert!(sniffer.is_running());
        let mut updates = sniffer.updates();
        feed.send(CapturedRecord::new(6250, flag_message(&registry, false))).await.unwrap();

        let event = updates.next().await.unwrap();
        let history = sniffer.list_messages("frontend_to_control", None).unwrap();
        assert_eq!(event.id, history.last().unwrap().id);
        assert_eq!(sniffer.stats().dispatched, 1);

        sniffer.stop().await;
        assert!(!sniffer.is_running());
        assert!(sniffer.list_messages("frontend_to_control", None).unwrap().len() >= 1);
    }

    #[tokio::test]
    async fn updates_end_with_the_capture() {
        let (registry, _) = flag_registry(10);
        let mut sniffer = Sniffer::new(Arc::clone(&registry), 10);
        assert!(sniffer.updates().next().await.is_none());

        let (feed, source) = ChannelSource::new(4);
        sniffer.start(source).await;
        let updates = sniffer.updates();
        feed.send(CapturedRecord::new(6250, flag_message(&registry, true))).await.unwrap();
        drop(feed);

        let events: Vec<_> = updates.collect().await;
        assert!(events.len() <= 1);
        assert_eq!(sniffer.list_messages("frontend_to_control", None).unwrap().len(), 1);
    }

    #[test]
    fn query_boundary_reports_unknown_services() {
        let (registry, _) = flag_registry(10);
        let sniffer = Sniffer::new(registry, 10);

        assert!(sniffer.list_messages("nope", None).is_none());
        assert!(sniffer.get_schema("nope").is_none());
        assert_eq!(sniffer.get_schema("frontend_to_control").map(<[Field]>::len), Some(5));
        assert_eq!(sniffer.services().count(), 1);
        assert_eq!(sniffer.capture_command("eth0"), "tcpdump -i eth0 -U -n -w - udp port '(6250)'");
    }
}
