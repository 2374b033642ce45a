//! HTTP request handlers.
//!
//! - [`create`] - Create a record
//! - [`read`] - Get a record by ID
//! - [`replace`] - Replace a record
//! - [`delete`] - Delete a record
//! - [`list`] - List records of a type
//! - [`stream`] - Event streams for get and list
//! - [`health`] - Health check endpoint

pub mod create;
pub mod delete;
pub mod health;
pub mod list;
pub mod read;
pub mod replace;
pub mod stream;

pub use create::create_handler;
pub use delete::delete_handler;
pub use health::health_handler;
pub use list::list_handler;
pub use read::read_handler;
pub use replace::replace_handler;
