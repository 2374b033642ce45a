//! The [`Record`] trait implemented by every stored record type.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record type that can be stored and served.
///
/// Implementors are plain serde structs whose fields all carry
/// `#[serde(default)]` (or a container-level `#[serde(default)]`), so that a
/// document missing a field deserializes to that field's zero value. This is
/// what gives replace its full-replace behavior.
///
/// `Fields` is the presence-tagged input type for create and replace: each
/// field is optional and only fields set to `Some` are sent.
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// The type name used in URLs and storage keys.
    const TYPE_NAME: &'static str;

    /// Presence-tagged input for create and replace.
    type Fields: Serialize + Send + Sync;
}
