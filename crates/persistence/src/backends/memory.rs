//! In-memory backend.
//!
//! Records live in a map guarded by a single [`RwLock`]. Every operation
//! takes the lock once, so a replace is never observed half-applied. Change
//! events are published while the write lock is held, so subscribers see
//! them in commit order.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::{ChangeFeed, Precondition, RecordEvent, RecordStorage};
use crate::error::{StorageError, StorageResult};
use crate::types::{ListOptions, StoredRecord};

type RecordKey = (String, String);

/// Volatile storage backend holding all records in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
    changes: ChangeFeed,
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("records", &self.records.read().len())
            .field("subscribers", &self.changes.subscriber_count())
            .finish()
    }
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of every type.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn key(type_name: &str, id: &str) -> RecordKey {
    (type_name.to_string(), id.to_string())
}

#[async_trait]
impl RecordStorage for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, type_name: &str, data: Value) -> StorageResult<StoredRecord> {
        let mut records = self.records.write();

        let mut id = uuid::Uuid::new_v4().to_string();
        while records.contains_key(&key(type_name, &id)) {
            id = uuid::Uuid::new_v4().to_string();
        }

        let record = StoredRecord::new(type_name, id.as_str(), data);
        records.insert(key(type_name, &id), record.clone());
        self.changes.publish(RecordEvent::Created(record.clone()));

        debug!(type_name = %type_name, id = %id, "Created record");
        Ok(record)
    }

    async fn read(&self, type_name: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
        Ok(self.records.read().get(&key(type_name, id)).cloned())
    }

    async fn replace(
        &self,
        type_name: &str,
        id: &str,
        data: Value,
        precondition: Option<&Precondition>,
    ) -> StorageResult<StoredRecord> {
        let mut records = self.records.write();

        let current = records
            .get_mut(&key(type_name, id))
            .ok_or_else(|| StorageError::not_found(type_name, id))?;

        if let Some(precondition) = precondition {
            precondition.check(current)?;
        }

        let replaced = current.replaced(data);
        *current = replaced.clone();
        self.changes.publish(RecordEvent::Replaced(replaced.clone()));

        debug!(
            type_name = %type_name,
            id = %id,
            generation = replaced.generation(),
            "Replaced record"
        );
        Ok(replaced)
    }

    async fn delete(
        &self,
        type_name: &str,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> StorageResult<()> {
        let mut records = self.records.write();
        let key = key(type_name, id);

        let current = records
            .get(&key)
            .ok_or_else(|| StorageError::not_found(type_name, id))?;

        if let Some(precondition) = precondition {
            precondition.check(current)?;
        }

        records.remove(&key);
        self.changes.publish(RecordEvent::Deleted {
            type_name: type_name.to_string(),
            id: id.to_string(),
        });
        debug!(type_name = %type_name, id = %id, "Deleted record");
        Ok(())
    }

    async fn list(
        &self,
        type_name: &str,
        options: &ListOptions,
    ) -> StorageResult<Vec<StoredRecord>> {
        let records = self.records.read();
        let of_type = records
            .iter()
            .filter(|((t, _), _)| t == type_name)
            .map(|(_, record)| record.clone());

        Ok(options.apply(of_type))
    }

    async fn count(&self, type_name: &str) -> StorageResult<u64> {
        let records = self.records.read();
        Ok(records.keys().filter(|(t, _)| t == type_name).count() as u64)
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.changes.subscribe()
    }
}
