//! Core record storage trait.
//!
//! This module defines the [`RecordStorage`] trait, which provides the
//! create, read, replace, delete and list operations every backend
//! implements.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StorageResult;
use crate::types::{ListOptions, StoredRecord};

use super::changes::RecordEvent;
use super::precondition::Precondition;

/// Core storage trait for records.
///
/// Backends store data documents that have already been normalized by a
/// [`RecordKind`](crate::registry::RecordKind): every field present, zero
/// values filled in, server-owned metadata stripped. Backends never merge a
/// new document with the stored one. A replace overwrites the whole data
/// document, so a field the caller omitted comes back as its zero value.
///
/// # Change feed
///
/// Every successful `create`, `replace` and `delete` publishes one
/// [`RecordEvent`] to the receivers handed out by [`subscribe`](Self::subscribe).
/// Events for one record are published in the order the writes commit.
///
/// # Atomicity
///
/// Each call is atomic. In particular `replace` reads the current record,
/// checks the precondition and writes the new document without any reader
/// observing an intermediate state.
///
/// # Example
///
/// ```ignore
/// use stowage_persistence::core::RecordStorage;
///
/// async fn example<S: RecordStorage>(storage: &S) -> Result<(), StorageError> {
///     let created = storage
///         .create("testtype", serde_json::json!({"text": "foo", "num": 5}))
///         .await?;
///
///     let replaced = storage
///         .replace("testtype", created.id(), serde_json::json!({"text": "bar", "num": 0}), None)
///         .await?;
///     assert_eq!(replaced.generation(), 1);
///
///     storage.delete("testtype", created.id(), None).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Creates a new record with a freshly allocated ID.
    ///
    /// # Arguments
    ///
    /// * `type_name` - The record type (e.g., "testtype")
    /// * `data` - The normalized data document
    ///
    /// # Returns
    ///
    /// The stored record at generation 0.
    async fn create(&self, type_name: &str, data: Value) -> StorageResult<StoredRecord>;

    /// Reads a record by type and ID.
    ///
    /// # Returns
    ///
    /// The stored record, or `None` if no such record exists.
    async fn read(&self, type_name: &str, id: &str) -> StorageResult<Option<StoredRecord>>;

    /// Replaces a record's data document.
    ///
    /// # Arguments
    ///
    /// * `type_name` - The record type
    /// * `id` - The record ID
    /// * `data` - The complete new data document
    /// * `precondition` - Optional `If-Match` state the record must be in
    ///
    /// # Returns
    ///
    /// The record with the new content and the next generation.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - If the record doesn't exist
    /// * `StorageError::Concurrency` - If the precondition doesn't hold
    async fn replace(
        &self,
        type_name: &str,
        id: &str,
        data: Value,
        precondition: Option<&Precondition>,
    ) -> StorageResult<StoredRecord>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - If the record doesn't exist
    /// * `StorageError::Concurrency` - If the precondition doesn't hold
    async fn delete(
        &self,
        type_name: &str,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> StorageResult<()>;

    /// Lists records of a type.
    ///
    /// Filters, ordering and windowing follow [`ListOptions`].
    async fn list(&self, type_name: &str, options: &ListOptions)
    -> StorageResult<Vec<StoredRecord>>;

    /// Counts the records of a type.
    async fn count(&self, type_name: &str) -> StorageResult<u64>;

    /// Subscribes to writes committed from now on.
    fn subscribe(&self) -> broadcast::Receiver<RecordEvent>;

    /// Checks whether a record exists.
    async fn exists(&self, type_name: &str, id: &str) -> StorageResult<bool> {
        Ok(self.read(type_name, id).await?.is_some())
    }
}
