//! Document store trait.
//!
//! A minimal key/value document API: read one by key, write one by key
//! (replace or merge), add one with an auto-generated key, and query a
//! collection by field equality.

use async_trait::async_trait;
use serde_json::Value;

use super::ProviderError;

/// A JSON object stored under a key.
pub type Document = serde_json::Map<String, Value>;

/// Collection names used by the storefront.
pub mod collections {
    /// Customer profiles keyed by auth uid.
    pub const USERS: &str = "users";
    /// Order records with auto-generated keys.
    pub const PURCHASES: &str = "purchases";
    /// Credentials of the local auth provider keyed by lower-cased email.
    pub const AUTH_ACCOUNTS: &str = "auth_accounts";
}

/// How `set` treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Overwrite the whole document.
    #[default]
    Replace,
    /// Merge fields into the existing document (recursively for objects).
    Merge,
    /// Write only when the key is free; fails with `already-exists` otherwise.
    Create,
}

/// A document together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub data: Document,
}

/// Document database collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document by key. `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, ProviderError>;

    /// Write a document by key.
    async fn set(
        &self,
        collection: &str,
        key: &str,
        data: Document,
        mode: WriteMode,
    ) -> Result<(), ProviderError>;

    /// Add a document under a fresh key and return the key.
    async fn add(&self, collection: &str, data: Document) -> Result<String, ProviderError>;

    /// All documents whose top-level `field` equals `value`, in insertion order.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, ProviderError>;
}

/// Merge `patch` into `target`.
///
/// Nested objects merge field by field; every other value (arrays included)
/// replaces the existing one.
pub fn merge_into(target: &mut Document, patch: Document) {
    for (field, value) in patch {
        match (target.get_mut(&field), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                target.insert(field, value);
            }
        }
    }
}

/// Convert a serializable value into a [`Document`].
///
/// # Errors
///
/// Returns an `invalid-argument` error if the value does not serialize to a
/// JSON object.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, ProviderError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ProviderError::new(
            "invalid-argument",
            format!("expected a JSON object, got {other}"),
        )),
        Err(e) => Err(ProviderError::new("invalid-argument", e.to_string())),
    }
}
