//! Core types for the persistence layer.
//!
//! - [`StoredRecord`] - A record's data fields with persistence metadata
//! - [`Record`] - Trait implemented by typed record structs
//! - [`TestType`], [`TestTypeFields`] - The `testtype` record and its input
//! - [`ListOptions`], [`ListQuery`] - Filtering, sorting and windowing
//!
//! # Examples
//!
//! ```
//! use stowage_persistence::types::{TestType, TestTypeFields};
//!
//! let fields = TestTypeFields::default().text("bar");
//! assert_eq!(fields.into_record(), TestType { text: "bar".to_string(), num: 0 });
//! ```

mod list_options;
mod record;
mod stored_record;
mod test_type;

pub use list_options::{
    FieldType, Filter, FilterOp, ListOptions, ListQuery, SortField, compare_values,
};
pub(crate) use list_options::invalid_option;
pub use record::Record;
pub use stored_record::{METADATA_FIELDS, StoredRecord, compute_etag, sha256_hex};
pub use test_type::{TestType, TestTypeFields};
