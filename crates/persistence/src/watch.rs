//! Watching records and lists for changes.
//!
//! A watch subscribes to the backend's change feed before it reads the
//! initial state, so no write between the two is lost. [`RecordWatch`]
//! follows one record; [`ListWatch`] re-runs a list query whenever a record
//! of its type changes and yields the result when it differs from the last
//! one yielded.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::core::{RecordEvent, RecordStorage};
use crate::error::StorageResult;
use crate::types::{ListOptions, StoredRecord, sha256_hex};

/// One step of a [`RecordWatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordUpdate {
    /// The state when the watch started.
    Initial(StoredRecord),
    /// The record was replaced.
    Updated(StoredRecord),
    /// The record was deleted. No further updates follow.
    Deleted,
}

/// Follows a single record.
pub struct RecordWatch<S> {
    storage: Arc<S>,
    receiver: broadcast::Receiver<RecordEvent>,
    type_name: String,
    id: String,
    initial: Option<StoredRecord>,
    generation: u64,
    finished: bool,
}

impl<S: RecordStorage> RecordWatch<S> {
    pub(crate) fn new(
        storage: Arc<S>,
        receiver: broadcast::Receiver<RecordEvent>,
        initial: StoredRecord,
    ) -> Self {
        Self {
            storage,
            receiver,
            type_name: initial.type_name().to_string(),
            id: initial.id().to_string(),
            generation: initial.generation(),
            initial: Some(initial),
            finished: false,
        }
    }

    /// ID of the watched record.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the next update.
    ///
    /// Returns `Ok(None)` once the record was deleted and the deletion was
    /// reported, or when the backend is gone. Updates older than one already
    /// yielded are skipped.
    pub async fn next(&mut self) -> StorageResult<Option<RecordUpdate>> {
        if let Some(initial) = self.initial.take() {
            return Ok(Some(RecordUpdate::Initial(initial)));
        }

        while !self.finished {
            match self.receiver.recv().await {
                Ok(event) => {
                    if !event.is_type(&self.type_name) || event.id() != self.id {
                        continue;
                    }
                    match event {
                        RecordEvent::Created(record) | RecordEvent::Replaced(record) => {
                            if let Some(update) = self.advance(record) {
                                return Ok(Some(update));
                            }
                        }
                        RecordEvent::Deleted { .. } => {
                            self.finished = true;
                            return Ok(Some(RecordUpdate::Deleted));
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(id = %self.id, skipped, "Record watch lagged; re-reading");
                    match self.storage.read(&self.type_name, &self.id).await? {
                        Some(record) => {
                            if let Some(update) = self.advance(record) {
                                return Ok(Some(update));
                            }
                        }
                        None => {
                            self.finished = true;
                            return Ok(Some(RecordUpdate::Deleted));
                        }
                    }
                }
                Err(RecvError::Closed) => self.finished = true,
            }
        }

        Ok(None)
    }

    fn advance(&mut self, record: StoredRecord) -> Option<RecordUpdate> {
        if record.generation() <= self.generation {
            return None;
        }
        self.generation = record.generation();
        Some(RecordUpdate::Updated(record))
    }
}

/// Follows the result of a list query.
pub struct ListWatch<S> {
    storage: Arc<S>,
    receiver: broadcast::Receiver<RecordEvent>,
    type_name: String,
    options: ListOptions,
    fingerprint: Option<String>,
    stale: bool,
}

impl<S: RecordStorage> ListWatch<S> {
    pub(crate) fn new(
        storage: Arc<S>,
        receiver: broadcast::Receiver<RecordEvent>,
        type_name: &str,
        options: ListOptions,
    ) -> Self {
        Self {
            storage,
            receiver,
            type_name: type_name.to_string(),
            options,
            fingerprint: None,
            stale: true,
        }
    }

    /// The resolved list options.
    pub fn options(&self) -> &ListOptions {
        &self.options
    }

    /// Waits for the next distinct list result.
    ///
    /// The first call returns the current list. Later calls return only when
    /// a write changes which records match, their order, or their
    /// generations. Returns `Ok(None)` when the backend is gone.
    pub async fn next(&mut self) -> StorageResult<Option<Vec<StoredRecord>>> {
        loop {
            if self.stale {
                self.stale = false;
                let records = self.storage.list(&self.type_name, &self.options).await?;
                let fingerprint = fingerprint(&records);
                if self.fingerprint.as_deref() != Some(fingerprint.as_str()) {
                    self.fingerprint = Some(fingerprint);
                    return Ok(Some(records));
                }
            }

            match self.receiver.recv().await {
                Ok(event) => self.stale = event.is_type(&self.type_name),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(type_name = %self.type_name, skipped, "List watch lagged; re-listing");
                    self.stale = true;
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }
}

fn fingerprint(records: &[StoredRecord]) -> String {
    let mut raw = String::new();
    for record in records {
        raw.push_str(record.id());
        raw.push(':');
        raw.push_str(&record.generation().to_string());
        raw.push(';');
    }
    sha256_hex(raw.as_bytes())
}
