//! Client-side storage.
//!
//! Pages keep a few values on the client: the product picked on the home
//! page, the "remember me" choice, and the transient flag marking a failed
//! auth attempt. Storage is best-effort: failures are logged and reads fall
//! back to "absent", the way a browser's storage behaves when it is
//! unavailable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tower_sessions::Session;

use crate::models::session_keys::{LOCAL_STORAGE_PREFIX, SESSION_STORAGE_PREFIX};

/// Storage keys.
pub mod keys {
    /// Product id chosen on the home page (local scope).
    pub const SELECTED_PRODUCT: &str = "selectedProduct";
    /// `"true"` when the customer ticked "remember me" (local scope).
    pub const REMEMBER_USER: &str = "rememberUser";
    /// Present while the last auth attempt failed (session scope).
    pub const AUTH_ERROR: &str = "authError";
}

/// Lifetime of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Persisted indefinitely.
    Local,
    /// Cleared when the browser session ends.
    Session,
}

/// Key/value storage owned by the client.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    async fn get_item(&self, scope: StorageScope, key: &str) -> Option<String>;

    async fn set_item(&self, scope: StorageScope, key: &str, value: &str);

    async fn remove_item(&self, scope: StorageScope, key: &str);

    /// Persist pending changes made outside a request.
    async fn flush(&self) {}
}

/// In-memory [`ClientStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<(StorageScope, String), String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every session-scoped value, as closing the browser would.
    pub fn end_session(&self) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(scope, _), _| *scope == StorageScope::Local);
    }
}

#[async_trait]
impl ClientStorage for MemoryStorage {
    async fn get_item(&self, scope: StorageScope, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(scope, key.to_owned()))
            .cloned()
    }

    async fn set_item(&self, scope: StorageScope, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((scope, key.to_owned()), value.to_owned());
    }

    async fn remove_item(&self, scope: StorageScope, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(scope, key.to_owned()));
    }
}

#[async_trait]
impl<T: ClientStorage + ?Sized> ClientStorage for Arc<T> {
    async fn get_item(&self, scope: StorageScope, key: &str) -> Option<String> {
        (**self).get_item(scope, key).await
    }

    async fn set_item(&self, scope: StorageScope, key: &str, value: &str) {
        (**self).set_item(scope, key, value).await;
    }

    async fn remove_item(&self, scope: StorageScope, key: &str) {
        (**self).remove_item(scope, key).await;
    }

    async fn flush(&self) {
        (**self).flush().await;
    }
}

fn session_key(scope: StorageScope, key: &str) -> String {
    match scope {
        StorageScope::Local => format!("{LOCAL_STORAGE_PREFIX}{key}"),
        StorageScope::Session => format!("{SESSION_STORAGE_PREFIX}{key}"),
    }
}

/// Client storage kept in the server-side `tower-sessions` session.
#[async_trait]
impl ClientStorage for Session {
    async fn get_item(&self, scope: StorageScope, key: &str) -> Option<String> {
        match self.get::<String>(&session_key(scope, key)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key, "failed to read client storage");
                None
            }
        }
    }

    async fn set_item(&self, scope: StorageScope, key: &str, value: &str) {
        if let Err(e) = self.insert(&session_key(scope, key), value).await {
            tracing::warn!(error = %e, key, "failed to write client storage");
        }
    }

    async fn remove_item(&self, scope: StorageScope, key: &str) {
        if let Err(e) = self.remove_value(&session_key(scope, key)).await {
            tracing::warn!(error = %e, key, "failed to remove client storage");
        }
    }

    async fn flush(&self) {
        if let Err(e) = self.save().await {
            tracing::warn!(error = %e, "failed to save session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scopes_are_separate() {
        let storage = MemoryStorage::new();
        storage.set_item(StorageScope::Local, "k", "local").await;
        storage.set_item(StorageScope::Session, "k", "session").await;

        assert_eq!(
            storage.get_item(StorageScope::Local, "k").await.as_deref(),
            Some("local")
        );
        assert_eq!(
            storage.get_item(StorageScope::Session, "k").await.as_deref(),
            Some("session")
        );
    }

    #[tokio::test]
    async fn test_end_session_keeps_local_values() {
        let storage = MemoryStorage::new();
        storage
            .set_item(StorageScope::Local, keys::REMEMBER_USER, "true")
            .await;
        storage
            .set_item(StorageScope::Session, keys::AUTH_ERROR, "true")
            .await;

        storage.end_session();
        assert!(
            storage
                .get_item(StorageScope::Local, keys::REMEMBER_USER)
                .await
                .is_some()
        );
        assert!(
            storage
                .get_item(StorageScope::Session, keys::AUTH_ERROR)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_remove_item() {
        let storage = MemoryStorage::new();
        storage
            .set_item(StorageScope::Local, keys::SELECTED_PRODUCT, "netflix")
            .await;
        storage
            .remove_item(StorageScope::Local, keys::SELECTED_PRODUCT)
            .await;
        assert!(
            storage
                .get_item(StorageScope::Local, keys::SELECTED_PRODUCT)
                .await
                .is_none()
        );
    }
}
