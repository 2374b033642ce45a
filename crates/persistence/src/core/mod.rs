//! Core storage traits and abstractions.
//!
//! - [`RecordStorage`] - The operations every backend implements
//! - [`Precondition`] - `If-Match` state checked by replace and delete
//! - [`ChangeFeed`] - Broadcast of committed writes

pub mod changes;
pub mod precondition;
pub mod storage;

pub use changes::{ChangeFeed, RecordEvent};
pub use precondition::{Precondition, normalize_etag};
pub use storage::RecordStorage;
