//! Repositories over the document store, plus the `PostgreSQL` pool.
//!
//! # Database
//!
//! When a database is configured, every collection lives in one JSONB table
//! and sessions live in the `tower-sessions` table:
//!
//! - `storefront.document` - `users`, `purchases` and `auth_accounts` documents
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p digitalhub-cli -- migrate
//! ```

pub mod purchases;
pub mod users;

pub use purchases::PurchaseRepository;
pub use users::UserRepository;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::backend::{ErrorCode, ProviderError};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The document store rejected or failed the operation.
    #[error("store error: {0}")]
    Provider(#[from] ProviderError),

    /// A stored document does not match the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Document not found.
    #[error("not found")]
    NotFound,
}

impl RepositoryError {
    /// The collaborator error code, when the store reported one.
    #[must_use]
    pub const fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Provider(err) => Some(&err.code),
            Self::DataCorruption(_) | Self::NotFound => None,
        }
    }
}

/// Decode a stored document, reporting shape mismatches as corruption.
fn decode<T: serde::de::DeserializeOwned>(
    collection: &str,
    key: &str,
    data: crate::backend::Document,
) -> Result<T, RepositoryError> {
    serde_json::from_value(serde_json::Value::Object(data)).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid document {collection}/{key}: {e}"))
    })
}
