//! Record store service.
//!
//! [`RecordService`] ties a [`RecordStorage`] backend to a
//! [`RecordRegistry`]. Inputs are normalized by the record's kind before they
//! reach the backend, which is what turns a replace carrying only some
//! fields into a full replace with zero values everywhere else.
//!
//! Two flavors of every operation exist: untyped ones addressed by type name
//! and taking JSON (used by the HTTP layer), and typed ones generic over a
//! [`Record`] type. Records can also be looked up by a unique ID prefix and
//! watched for changes (see [`crate::watch`]).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stowage_persistence::backends::memory::MemoryBackend;
//! use stowage_persistence::service::RecordService;
//! use stowage_persistence::types::{TestType, TestTypeFields};
//!
//! # tokio_test::block_on(async {
//! let service = RecordService::new(Arc::new(MemoryBackend::new()));
//!
//! let created = service
//!     .create::<TestType>(&TestTypeFields::default().text("foo").num(5))
//!     .await?;
//!
//! let replaced = service
//!     .replace::<TestType>(&created.id, &TestTypeFields::default().text("bar"), None)
//!     .await?;
//!
//! assert_eq!(replaced.record, TestType { text: "bar".to_string(), num: 0 });
//! # Ok::<(), stowage_persistence::StorageError>(())
//! # }).unwrap();
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{Precondition, RecordStorage};
use crate::error::{ResourceError, StorageError, StorageResult};
use crate::registry::{RecordKind, RecordRegistry, TypedKind};
use crate::types::{Filter, FilterOp, ListOptions, ListQuery, Record, StoredRecord};
use crate::watch::{ListWatch, RecordWatch};

/// A typed record together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<T> {
    /// Record ID.
    pub id: String,
    /// Current etag.
    pub etag: String,
    /// Current generation.
    pub generation: u64,
    /// The record's data fields.
    #[serde(flatten)]
    pub record: T,
}

impl<T: Record> TryFrom<StoredRecord> for Stored<T> {
    type Error = StorageError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let id = stored.id().to_string();
        let etag = stored.etag().to_string();
        let generation = stored.generation();
        let record = serde_json::from_value(stored.into_content())?;

        Ok(Self {
            id,
            etag,
            generation,
            record,
        })
    }
}

/// The record store.
pub struct RecordService<S> {
    storage: Arc<S>,
    registry: Arc<RecordRegistry>,
}

impl<S> Clone for RecordService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: RecordStorage> RecordService<S> {
    /// Creates a service over `storage` with the built-in record types.
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_registry(storage, Arc::new(RecordRegistry::with_defaults()))
    }

    /// Creates a service with a custom registry.
    pub fn with_registry(storage: Arc<S>, registry: Arc<RecordRegistry>) -> Self {
        Self { storage, registry }
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<RecordRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Untyped operations
    // ------------------------------------------------------------------

    /// Creates a record from a JSON document.
    ///
    /// # Errors
    ///
    /// * `ValidationError::UnknownType` - `type_name` is not registered
    /// * `ValidationError::InvalidRecord` - the document is malformed
    pub async fn create_record(&self, type_name: &str, input: Value) -> StorageResult<StoredRecord> {
        let kind = self.registry.get(type_name)?;
        self.create_with(kind.as_ref(), input).await
    }

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - no record with this ID exists
    pub async fn get_record(&self, type_name: &str, id: &str) -> StorageResult<StoredRecord> {
        self.registry.get(type_name)?;
        self.storage
            .read(type_name, id)
            .await?
            .ok_or_else(|| StorageError::not_found(type_name, id))
    }

    /// Finds the one record whose ID starts with `short_id`.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - no ID has this prefix
    /// * `ResourceError::Ambiguous` - more than one ID has this prefix
    pub async fn find_record(&self, type_name: &str, short_id: &str) -> StorageResult<StoredRecord> {
        self.registry.get(type_name)?;
        self.find_in(type_name, short_id).await
    }

    /// Replaces a record with a JSON document.
    ///
    /// Fields missing from `input` are reset to their zero values.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidRecord` - the document is malformed
    /// * `ResourceError::NotFound` - no record with this ID exists
    /// * `StorageError::Concurrency` - the precondition doesn't hold
    pub async fn replace_record(
        &self,
        type_name: &str,
        id: &str,
        input: Value,
        precondition: Option<&Precondition>,
    ) -> StorageResult<StoredRecord> {
        let kind = self.registry.get(type_name)?;
        self.replace_with(kind.as_ref(), id, input, precondition).await
    }

    /// Deletes a record.
    pub async fn delete_record(
        &self,
        type_name: &str,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> StorageResult<()> {
        self.registry.get(type_name)?;
        self.delete_with(type_name, id, precondition).await
    }

    /// Lists records matching a raw query.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidListOption` - unknown field or bad value
    pub async fn list_records(
        &self,
        type_name: &str,
        query: &ListQuery,
    ) -> StorageResult<Vec<StoredRecord>> {
        let kind = self.registry.get(type_name)?;
        let options = kind.resolve_list(query)?;
        self.storage.list(type_name, &options).await
    }

    /// Starts following a record.
    ///
    /// The first update is the record's current state.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - no record with this ID exists
    pub async fn watch_record(&self, type_name: &str, id: &str) -> StorageResult<RecordWatch<S>> {
        self.registry.get(type_name)?;
        let receiver = self.storage.subscribe();
        let initial = self
            .storage
            .read(type_name, id)
            .await?
            .ok_or_else(|| StorageError::not_found(type_name, id))?;

        debug!(type_name = %type_name, id = %id, "Watching record");
        Ok(RecordWatch::new(Arc::clone(&self.storage), receiver, initial))
    }

    /// Starts following the result of a list query.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidListOption` - unknown field or bad value
    pub async fn watch_list(&self, type_name: &str, query: &ListQuery) -> StorageResult<ListWatch<S>> {
        let kind = self.registry.get(type_name)?;
        let options = kind.resolve_list(query)?;

        debug!(type_name = %type_name, filters = options.filters.len(), "Watching list");
        Ok(ListWatch::new(
            Arc::clone(&self.storage),
            self.storage.subscribe(),
            type_name,
            options,
        ))
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    /// Creates a `T` from presence-tagged fields.
    pub async fn create<T: Record>(&self, fields: &T::Fields) -> StorageResult<Stored<T>> {
        let input = serde_json::to_value(fields)?;
        self.create_with(&TypedKind::<T>::new(), input)
            .await?
            .try_into()
    }

    /// Reads a `T`.
    pub async fn get<T: Record>(&self, id: &str) -> StorageResult<Stored<T>> {
        self.storage
            .read(T::TYPE_NAME, id)
            .await?
            .ok_or_else(|| StorageError::not_found(T::TYPE_NAME, id))?
            .try_into()
    }

    /// Finds the `T` whose ID starts with `short_id`.
    pub async fn find<T: Record>(&self, short_id: &str) -> StorageResult<Stored<T>> {
        self.find_in(T::TYPE_NAME, short_id).await?.try_into()
    }

    /// Replaces a `T`. Fields left unset are reset to their zero values.
    pub async fn replace<T: Record>(
        &self,
        id: &str,
        fields: &T::Fields,
        precondition: Option<&Precondition>,
    ) -> StorageResult<Stored<T>> {
        let input = serde_json::to_value(fields)?;
        self.replace_with(&TypedKind::<T>::new(), id, input, precondition)
            .await?
            .try_into()
    }

    /// Deletes a `T`.
    pub async fn delete<T: Record>(
        &self,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> StorageResult<()> {
        self.delete_with(T::TYPE_NAME, id, precondition).await
    }

    /// Lists `T` records.
    pub async fn list<T: Record>(&self, options: &ListOptions) -> StorageResult<Vec<Stored<T>>> {
        TypedKind::<T>::new().check_list(options)?;
        self.storage
            .list(T::TYPE_NAME, options)
            .await?
            .into_iter()
            .map(Stored::try_from)
            .collect()
    }

    // ------------------------------------------------------------------
    // Shared paths
    // ------------------------------------------------------------------

    async fn find_in(&self, type_name: &str, short_id: &str) -> StorageResult<StoredRecord> {
        let options = ListOptions::new()
            .filter(Filter::new("id", FilterOp::HasPrefix, short_id))
            .limit(2);
        let mut matches = self.storage.list(type_name, &options).await?;

        match matches.len() {
            0 => Err(StorageError::not_found(type_name, short_id)),
            1 => Ok(matches.remove(0)),
            _ => Err(ResourceError::Ambiguous {
                type_name: type_name.to_string(),
                prefix: short_id.to_string(),
            }
            .into()),
        }
    }

    async fn create_with(&self, kind: &dyn RecordKind, input: Value) -> StorageResult<StoredRecord> {
        let data = kind.normalize(input)?;
        let created = self.storage.create(kind.type_name(), data).await?;

        debug!(
            type_name = %kind.type_name(),
            id = %created.id(),
            backend = self.storage.backend_name(),
            "Record created"
        );
        Ok(created)
    }

    async fn replace_with(
        &self,
        kind: &dyn RecordKind,
        id: &str,
        input: Value,
        precondition: Option<&Precondition>,
    ) -> StorageResult<StoredRecord> {
        let data = kind.normalize(input)?;
        let result = self
            .storage
            .replace(kind.type_name(), id, data, precondition)
            .await;

        if let Err(e) = &result
            && e.is_precondition_failed()
        {
            warn!(type_name = %kind.type_name(), id = %id, error = %e, "Replace rejected");
        }
        result
    }

    async fn delete_with(
        &self,
        type_name: &str,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> StorageResult<()> {
        let result = self.storage.delete(type_name, id, precondition).await;

        if let Err(e) = &result
            && e.is_precondition_failed()
        {
            warn!(type_name = %type_name, id = %id, error = %e, "Delete rejected");
        }
        result
    }
}
