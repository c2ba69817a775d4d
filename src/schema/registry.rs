//! Schema registry: one immutable schema per configured service

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{SchemaLoader, ServiceDirectory};
use crate::types::{Schema, Service};

/// A service together with its schema.
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    pub service: Service,
    pub schema: Arc<Schema>,
}

/// Read-only lookup table from service name and port to schema.
///
/// Built once at startup and shared between the capture worker, the store and
/// the injector.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<String, ServiceEntry>,
    ports: HashMap<u16, String>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema for every service in `directory` from `schema_dir`.
    ///
    /// Services whose schema file is missing or invalid are left out with a warning.
    pub fn load<P: AsRef<Path>>(directory: &ServiceDirectory, schema_dir: P) -> Self {
        let loader = SchemaLoader::new(schema_dir.as_ref());
        let mut registry = Self::new();

        for service in directory.iter() {
            match loader.load_schema(&service.name) {
                Ok(schema) => registry.insert(service.clone(), schema),
                Err(e) => warn!("Skipping service {}: {}", service.name, e),
            }
        }

        info!(
            "Loaded {} of {} service schemas from {}",
            registry.len(),
            directory.len(),
            loader.dir().display()
        );
        registry
    }

    /// Register a service and its schema, replacing any entry of the same name.
    ///
    /// If another service already owns the port, the new one takes it over.
    pub fn insert(&mut self, service: Service, schema: Schema) {
        if let Some(owner) = self.ports.get(&service.port) {
            if *owner != service.name {
                warn!(
                    port = service.port,
                    "Port already bound to {}, rebinding to {}", owner, service.name
                );
            }
        }
        if let Some(previous) = self.entries.get(&service.name) {
            if self.ports.get(&previous.service.port) == Some(&service.name) {
                self.ports.remove(&previous.service.port);
            }
        }

        self.ports.insert(service.port, service.name.clone());
        self.entries
            .insert(service.name.clone(), ServiceEntry { service, schema: Arc::new(schema) });
    }

    /// Look up an entry by service name.
    pub fn by_name(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.get(name)
    }

    /// Look up the entry bound to a destination port.
    pub fn by_port(&self, port: u16) -> Option<&ServiceEntry> {
        self.ports.get(&port).and_then(|name| self.entries.get(name))
    }

    /// Schema of a service.
    pub fn schema(&self, name: &str) -> Option<&Arc<Schema>> {
        self.by_name(name).map(|entry| &entry.schema)
    }

    /// Bound ports, ascending.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.ports.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Iterate over entries in service name order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.entries.values()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no service is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TempDir, service};
    use crate::types::{Field, FieldType};

    #[test]
    fn load_skips_services_without_schema() {
        let dir = TempDir::new("registry-load");
        dir.write("a_to_b", "Flag BOOL\n");

        let directory =
            ServiceDirectory::new(vec![service("a_to_b", 5000), service("c_to_d", 5001)]);
        let registry = SchemaRegistry::load(&directory, dir.path());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_port(5000).unwrap().service.name, "a_to_b");
        assert!(registry.by_port(5001).is_none());
        assert_eq!(registry.schema("a_to_b").unwrap().wire_size(), 24);
    }

    #[test]
    fn later_service_takes_over_a_shared_port() {
        let mut registry = SchemaRegistry::new();
        let body = vec![Field::new("X", FieldType::UInt8)];
        registry.insert(service("a_to_b", 6000), Schema::new("a_to_b", body.clone()).unwrap());
        registry.insert(service("c_to_d", 6000), Schema::new("c_to_d", body).unwrap());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.by_port(6000).unwrap().service.name, "c_to_d");
        assert_eq!(registry.ports(), vec![6000]);
    }

    #[test]
    fn reinserting_a_service_moves_its_port() {
        let mut registry = SchemaRegistry::new();
        registry.insert(service("a_to_b", 6000), Schema::new("a_to_b", vec![]).unwrap());
        registry.insert(service("a_to_b", 6001), Schema::new("a_to_b", vec![]).unwrap());

        assert!(registry.by_port(6000).is_none());
        assert_eq!(registry.by_port(6001).unwrap().service.port, 6001);
    }
}
