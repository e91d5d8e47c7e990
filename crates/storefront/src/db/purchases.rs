//! Purchase repository (`purchases` collection).

use serde_json::Value;

use digitalhub_core::{PurchaseId, UserId};

use super::{RepositoryError, decode};
use crate::backend::store::to_document;
use crate::backend::{DocumentStore, collections};
use crate::models::{OrderRecord, Purchase};

/// Repository for order records.
pub struct PurchaseRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> PurchaseRepository<'a> {
    /// Create a new purchase repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Write an order record under a fresh key.
    ///
    /// A plain create: retrying after an ambiguous failure may write a
    /// second record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the write fails.
    pub async fn create(&self, record: &OrderRecord) -> Result<PurchaseId, RepositoryError> {
        let key = self
            .store
            .add(collections::PURCHASES, to_document(record)?)
            .await?;
        Ok(PurchaseId::new(key))
    }

    /// All purchases owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a document is malformed.
    pub async fn list_for_user(&self, uid: &UserId) -> Result<Vec<Purchase>, RepositoryError> {
        let docs = self
            .store
            .query_eq(
                collections::PURCHASES,
                "userId",
                &Value::String(uid.as_str().to_owned()),
            )
            .await?;

        let mut purchases = docs
            .into_iter()
            .map(|doc| {
                let record: OrderRecord = decode(collections::PURCHASES, &doc.key, doc.data)?;
                Ok(Purchase {
                    id: PurchaseId::new(doc.key),
                    record,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        purchases.sort_by(|a, b| b.record.purchase_date.cmp(&a.record.purchase_date));
        Ok(purchases)
    }
}
