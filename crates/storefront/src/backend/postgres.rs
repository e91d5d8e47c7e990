//! `PostgreSQL`-backed document store.
//!
//! All collections share one JSONB table:
//!
//! ```sql
//! storefront.document (collection TEXT, key TEXT, data JSONB, created_at, updated_at)
//! ```
//!
//! Merge writes are a read-modify-write inside a transaction holding the row
//! lock, so concurrent merges on the same key do not lose fields.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use digitalhub_core::PurchaseId;

use super::store::{Document, DocumentStore, StoredDocument, WriteMode, merge_into};
use super::{ErrorCode, ProviderError};

/// `PostgreSQL` SQLSTATE for `insufficient_privilege`.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// [`DocumentStore`] over a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert-if-absent; the unique key makes concurrent creates race-free.
    async fn create(&self, collection: &str, key: &str, data: Document) -> Result<(), ProviderError> {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.document (collection, key, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key) DO NOTHING
            ",
        )
        .bind(collection)
        .bind(key)
        .bind(Json(Value::Object(data)))
        .execute(&self.pool)
        .await
        .map_err(|e| provider_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(ProviderError::new(
                ErrorCode::AlreadyExists,
                format!("{collection}/{key} already exists"),
            ));
        }
        Ok(())
    }
}

/// Map a sqlx failure onto the collaborator error codes.
fn provider_error(err: &sqlx::Error) -> ProviderError {
    let code = match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) => {
            ErrorCode::PermissionDenied
        }
        _ => ErrorCode::Unavailable,
    };
    tracing::warn!(error = %err, code = %code, "document store query failed");
    ProviderError::new(code, err.to_string())
}

fn into_document(value: Value) -> Result<Document, ProviderError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ProviderError::new(
            "data-loss",
            format!("stored document is not an object: {other}"),
        )),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, ProviderError> {
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            r"
            SELECT data
            FROM storefront.document
            WHERE collection = $1 AND key = $2
            ",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| provider_error(&e))?;

        row.map(|(Json(data),)| into_document(data)).transpose()
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        data: Document,
        mode: WriteMode,
    ) -> Result<(), ProviderError> {
        if mode == WriteMode::Create {
            return self.create(collection, key, data).await;
        }

        let mut tx = self.pool.begin().await.map_err(|e| provider_error(&e))?;

        let data = match mode {
            WriteMode::Replace | WriteMode::Create => data,
            WriteMode::Merge => {
                let existing: Option<(Json<Value>,)> = sqlx::query_as(
                    r"
                    SELECT data
                    FROM storefront.document
                    WHERE collection = $1 AND key = $2
                    FOR UPDATE
                    ",
                )
                .bind(collection)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| provider_error(&e))?;

                match existing {
                    Some((Json(current),)) => {
                        let mut current = into_document(current)?;
                        merge_into(&mut current, data);
                        current
                    }
                    None => data,
                }
            }
        };

        sqlx::query(
            r"
            INSERT INTO storefront.document (collection, key, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            ",
        )
        .bind(collection)
        .bind(key)
        .bind(Json(Value::Object(data)))
        .execute(&mut *tx)
        .await
        .map_err(|e| provider_error(&e))?;

        tx.commit().await.map_err(|e| provider_error(&e))?;
        Ok(())
    }

    async fn add(&self, collection: &str, data: Document) -> Result<String, ProviderError> {
        let key = PurchaseId::generate().into_inner();

        sqlx::query(
            r"
            INSERT INTO storefront.document (collection, key, data)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(collection)
        .bind(&key)
        .bind(Json(Value::Object(data)))
        .execute(&self.pool)
        .await
        .map_err(|e| provider_error(&e))?;

        Ok(key)
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, ProviderError> {
        let rows: Vec<(String, Json<Value>)> = sqlx::query_as(
            r"
            SELECT key, data
            FROM storefront.document
            WHERE collection = $1 AND data -> $2 = $3
            ORDER BY created_at, key
            ",
        )
        .bind(collection)
        .bind(field)
        .bind(Json(value))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| provider_error(&e))?;

        rows.into_iter()
            .map(|(key, Json(data))| {
                Ok(StoredDocument {
                    key,
                    data: into_document(data)?,
                })
            })
            .collect()
    }
}
