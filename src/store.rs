//! Bounded per-service message history
//!
//! Each service gets its own [`ServiceStore`]: an ordered, capacity-bounded buffer
//! of decoded messages with store-assigned ids. Consumers poll it incrementally by
//! passing the last id they have seen.
//!
//! Each store sits behind its own lock, so a busy service never blocks readers of
//! another. Inserts and range reads on one store exclude each other; range reads
//! may run concurrently.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

use crate::schema::SchemaRegistry;
use crate::types::{Field, Schema, StoredMessage, Value};

/// Default number of messages retained per service.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct History {
    next_id: u64,
    messages: VecDeque<StoredMessage>,
}

/// Capacity-bounded, id-ordered history of one service.
#[derive(Debug)]
pub struct ServiceStore {
    schema: Arc<Schema>,
    capacity: usize,
    history: RwLock<History>,
}

impl ServiceStore {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(schema: Arc<Schema>, capacity: usize) -> Self {
        Self { schema, capacity: capacity.max(1), history: RwLock::new(History::default()) }
    }

    /// Schema of the stored messages.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Maximum number of retained messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries dropped in one go when capacity is exceeded:
    /// a tenth of the capacity, at least one.
    pub fn eviction_batch(&self) -> usize {
        (self.capacity / 10).max(1)
    }

    /// Append a message and return the id assigned to it.
    ///
    /// When the store grows past capacity the oldest [`eviction_batch`](Self::eviction_batch)
    /// entries are removed together.
    pub fn insert(&self, fields: Vec<Value>) -> u64 {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);

        let id = history.next_id;
        history.next_id += 1;
        history.messages.push_back(StoredMessage::new(id, fields));

        if history.messages.len() > self.capacity {
            let batch = self.eviction_batch().min(history.messages.len());
            history.messages.drain(..batch);
            trace!(
                service = self.schema.service_name(),
                evicted = batch,
                "Store over capacity, oldest messages dropped"
            );
        }

        id
    }

    /// Messages newer than `last_seen`, oldest first.
    ///
    /// - `None`, an empty store, or an id older than the oldest retained one returns
    ///   everything currently retained. No gap is signalled; callers infer it from ids.
    /// - An id at or past the newest returns nothing.
    /// - Otherwise everything strictly after `last_seen`. If that exact id is no longer
    ///   present the result is empty.
    pub fn range(&self, last_seen: Option<u64>) -> Vec<StoredMessage> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let messages = &history.messages;

        let (Some(oldest), Some(newest)) = (messages.front(), messages.back()) else {
            return Vec::new();
        };

        match last_seen {
            None => messages.iter().cloned().collect(),
            Some(last) if last < oldest.id => messages.iter().cloned().collect(),
            Some(last) if last >= newest.id => Vec::new(),
            Some(last) => match messages.binary_search_by_key(&last, |message| message.id) {
                Ok(index) => messages.range(index + 1..).cloned().collect(),
                Err(_) => Vec::new(),
            },
        }
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.history.read().unwrap_or_else(PoisonError::into_inner).messages.len()
    }

    /// Whether no message is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the newest retained message.
    pub fn last_id(&self) -> Option<u64> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .back()
            .map(|message| message.id)
    }
}

/// The set of per-service stores, keyed by service name.
///
/// The key set is fixed at construction; only the stores' contents change.
#[derive(Debug, Default)]
pub struct MessageStore {
    stores: HashMap<String, Arc<ServiceStore>>,
}

impl MessageStore {
    /// One store per registered service, each holding up to `capacity` messages.
    pub fn new(registry: &SchemaRegistry, capacity: usize) -> Self {
        let stores = registry
            .iter()
            .map(|entry| {
                let store = ServiceStore::new(Arc::clone(&entry.schema), capacity);
                (entry.service.name.clone(), Arc::new(store))
            })
            .collect();
        Self { stores }
    }

    /// Store of one service.
    pub fn service(&self, name: &str) -> Option<&Arc<ServiceStore>> {
        self.stores.get(name)
    }

    /// Append a decoded message to a service's history.
    ///
    /// Returns the assigned id, or `None` for an unknown service.
    pub fn insert(&self, name: &str, fields: Vec<Value>) -> Option<u64> {
        self.stores.get(name).map(|store| store.insert(fields))
    }

    /// Messages of `name` newer than `last_id`; `None` for an unknown service.
    pub fn list_messages(&self, name: &str, last_id: Option<u64>) -> Option<Vec<StoredMessage>> {
        self.stores.get(name).map(|store| store.range(last_id))
    }

    /// Field list of `name`, header first; `None` for an unknown service.
    pub fn get_schema(&self, name: &str) -> Option<&[Field]> {
        self.stores.get(name).map(|store| store.schema().fields())
    }

    /// Names of all services with a store.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }
}
