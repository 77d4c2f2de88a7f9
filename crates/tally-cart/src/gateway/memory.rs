//! # In-Memory Gateways
//!
//! Mutex-backed gateway implementations.
//!
//! Used by the test suite and by embeddings that don't need a durable
//! backend (a request-scoped cart, a demo binary). They also document the
//! contract a real backend has to honor - in particular the unique
//! constraint on (identifier, instance) in [`MemoryRecords`].

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::{CartError, CartResult};
use crate::gateway::{ModelResolver, PersistedCartRecord, RecordGateway, SessionGateway};

// =============================================================================
// Memory Session
// =============================================================================

/// In-memory session store: instance name → serialized item mapping.
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySession {
    /// Creates an empty session store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionGateway for MemorySession {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn put(&self, key: &str, payload: Vec<u8>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), payload);
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

// =============================================================================
// Memory Records
// =============================================================================

/// In-memory record store enforcing the unique constraint on
/// (identifier, instance).
#[derive(Debug, Default)]
pub struct MemoryRecords {
    records: Mutex<HashMap<(String, String), PersistedCartRecord>>,
}

impl MemoryRecords {
    /// Creates an empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records. Test helper.
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordGateway for MemoryRecords {
    fn find(&self, identifier: &str, instance: &str) -> Option<PersistedCartRecord> {
        self.records.lock().ok().and_then(|records| {
            records
                .get(&(identifier.to_string(), instance.to_string()))
                .cloned()
        })
    }

    fn insert(&self, record: PersistedCartRecord) -> CartResult<()> {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = (record.identifier.clone(), record.instance.clone());
        if records.contains_key(&key) {
            return Err(CartError::DuplicateRecord {
                identifier: record.identifier,
                instance: record.instance,
            });
        }
        records.insert(key, record);
        Ok(())
    }

    fn update(&self, record: PersistedCartRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                (record.identifier.clone(), record.instance.clone()),
                record,
            );
        }
    }

    fn delete(&self, identifier: &str, instance: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.remove(&(identifier.to_string(), instance.to_string()));
        }
    }
}

// =============================================================================
// Memory Resolver
// =============================================================================

/// In-memory model resolver: registered type tags, each holding a
/// key → JSON object table.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    models: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryResolver {
    /// Creates a resolver that recognizes no types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type tag, with no objects yet.
    pub fn register(&self, type_tag: &str) {
        if let Ok(mut models) = self.models.lock() {
            models.entry(type_tag.to_string()).or_default();
        }
    }

    /// Registers an object under (type tag, key).
    pub fn put(&self, type_tag: &str, key: &str, value: Value) {
        if let Ok(mut models) = self.models.lock() {
            models
                .entry(type_tag.to_string())
                .or_default()
                .insert(key.to_string(), value);
        }
    }
}

impl ModelResolver for MemoryResolver {
    fn recognizes(&self, type_tag: &str) -> bool {
        self.models
            .lock()
            .map(|models| models.contains_key(type_tag))
            .unwrap_or(false)
    }

    fn resolve(&self, type_tag: &str, key: &str) -> Option<Value> {
        self.models
            .lock()
            .ok()
            .and_then(|models| models.get(type_tag)?.get(key).cloned())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
