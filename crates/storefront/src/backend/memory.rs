//! In-memory document store.
//!
//! Used for local development without a database and throughout the test
//! suite. Failures can be injected to exercise the error paths of the page
//! services.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use digitalhub_core::PurchaseId;

use super::store::{Document, DocumentStore, StoredDocument, WriteMode, merge_into};
use super::{ErrorCode, ProviderError};

/// Which operations an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Reads,
    Writes,
    All,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    on: FailOn,
    code: ErrorCode,
}

#[derive(Debug, Default)]
struct Collection {
    // insertion sequence keeps query results in write order
    docs: HashMap<String, (u64, Document)>,
    next_seq: u64,
}

/// Thread-safe in-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    failure: Mutex<Option<InjectedFailure>>,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent operations fail with `code` until [`Self::clear_failure`].
    pub fn inject_failure(&self, on: FailOn, code: ErrorCode) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(InjectedFailure { on, code });
    }

    /// Remove any injected failure.
    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of successful `set` and `add` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.docs.len())
    }

    fn check(&self, write: bool) -> Result<(), ProviderError> {
        let failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        match failure.as_ref() {
            Some(f)
                if f.on == FailOn::All
                    || (write && f.on == FailOn::Writes)
                    || (!write && f.on == FailOn::Reads) =>
            {
                Err(ProviderError::new(f.code.clone(), "injected failure"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, ProviderError> {
        self.check(false)?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.docs.get(key))
            .map(|(_, doc)| doc.clone()))
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        data: Document,
        mode: WriteMode,
    ) -> Result<(), ProviderError> {
        self.check(true)?;
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_owned()).or_default();

        if let Some((_, existing)) = coll.docs.get_mut(key) {
            match mode {
                WriteMode::Replace => *existing = data,
                WriteMode::Merge => merge_into(existing, data),
                WriteMode::Create => {
                    return Err(ProviderError::new(
                        ErrorCode::AlreadyExists,
                        format!("{collection}/{key} already exists"),
                    ));
                }
            }
        } else {
            let seq = coll.next_seq;
            coll.next_seq += 1;
            coll.docs.insert(key.to_owned(), (seq, data));
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Document) -> Result<String, ProviderError> {
        self.check(true)?;
        let key = PurchaseId::generate().into_inner();
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_owned()).or_default();
        let seq = coll.next_seq;
        coll.next_seq += 1;
        coll.docs.insert(key.clone(), (seq, data));

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(key)
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, ProviderError> {
        self.check(false)?;
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let ordered: BTreeMap<u64, StoredDocument> = coll
            .docs
            .iter()
            .filter(|(_, (_, doc))| doc.get(field) == Some(value))
            .map(|(key, (seq, doc))| {
                (
                    *seq,
                    StoredDocument {
                        key: key.clone(),
                        data: doc.clone(),
                    },
                )
            })
            .collect();

        Ok(ordered.into_values().collect())
    }
}
