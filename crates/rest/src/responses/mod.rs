//! Response formatting for the REST API.
//!
//! - [`headers`] - Response header generation (ETag, Location, etc.)
//! - [`list`] - List bodies and their ETags

pub mod headers;
pub mod list;

pub use headers::RecordHeaders;
pub use list::ListBody;
