//! Record change notifications.
//!
//! Every backend owns a [`ChangeFeed`] and publishes a [`RecordEvent`] after
//! each successful write. Subscribers receive events through a
//! `tokio::sync::broadcast` channel; a subscriber that falls behind by more
//! than the channel capacity sees `RecvError::Lagged` and is expected to
//! re-read the state it tracks.

use tokio::sync::broadcast;

use crate::types::StoredRecord;

/// Default number of events buffered per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// A committed write.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    /// A record was created.
    Created(StoredRecord),
    /// A record was replaced; holds the new state.
    Replaced(StoredRecord),
    /// A record was deleted.
    Deleted {
        /// The record type.
        type_name: String,
        /// The record ID.
        id: String,
    },
}

impl RecordEvent {
    /// Type of the affected record.
    pub fn type_name(&self) -> &str {
        match self {
            RecordEvent::Created(record) | RecordEvent::Replaced(record) => record.type_name(),
            RecordEvent::Deleted { type_name, .. } => type_name,
        }
    }

    /// ID of the affected record.
    pub fn id(&self) -> &str {
        match self {
            RecordEvent::Created(record) | RecordEvent::Replaced(record) => record.id(),
            RecordEvent::Deleted { id, .. } => id,
        }
    }

    /// The record's state after the write, `None` for deletes.
    pub fn record(&self) -> Option<&StoredRecord> {
        match self {
            RecordEvent::Created(record) | RecordEvent::Replaced(record) => Some(record),
            RecordEvent::Deleted { .. } => None,
        }
    }

    /// Returns true if the event concerns records of `type_name`.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }
}

/// Broadcast sender shared by a backend's write paths.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RecordEvent>,
}

impl ChangeFeed {
    /// Creates a feed buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Without subscribers the event is dropped.
    pub fn publish(&self, event: RecordEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
