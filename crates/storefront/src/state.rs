//! Application state shared across handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use sqlx::PgPool;

use crate::backend::{AccountDirectory, AuthUser, DocumentStore, LocalAuthProvider, MemoryDocumentStore};
use crate::checkout::CheckoutSession;
use crate::config::StorefrontConfig;
use crate::db::{PurchaseRepository, UserRepository};
use crate::page::PageContext;

/// Upper bound on live checkouts held in memory.
const MAX_LIVE_CHECKOUTS: u64 = 10_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the document store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DocumentStore>,
    accounts: Arc<AccountDirectory>,
    checkouts: Cache<String, Arc<CheckoutSession>>,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Document store backing users, purchases and accounts
    /// * `pool` - `PostgreSQL` pool, when the store is database-backed
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<dyn DocumentStore>, pool: Option<PgPool>) -> Self {
        let accounts = Arc::new(AccountDirectory::new(Arc::clone(&store)));
        let checkouts = Cache::builder()
            .max_capacity(MAX_LIVE_CHECKOUTS)
            .expire_after(CheckoutExpiry)
            .eviction_listener(|key: Arc<String>, checkout: Arc<CheckoutSession>, cause| {
                // Re-inserting an entry refreshes its expiry; the checkout lives on.
                if matches!(cause, RemovalCause::Replaced) {
                    return;
                }
                tracing::debug!(checkout_id = %key, ?cause, "checkout evicted");
                checkout.close();
            })
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                accounts,
                checkouts,
                pool,
            }),
        }
    }

    /// State over in-memory collaborators.
    #[must_use]
    pub fn in_memory(config: StorefrontConfig) -> Self {
        Self::new(config, Arc::new(MemoryDocumentStore::new()), None)
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    /// Get the account directory behind the auth provider.
    #[must_use]
    pub fn accounts(&self) -> &Arc<AccountDirectory> {
        &self.inner.accounts
    }

    /// Live checkouts keyed by checkout id.
    #[must_use]
    pub fn checkouts(&self) -> &Cache<String, Arc<CheckoutSession>> {
        &self.inner.checkouts
    }

    /// Get the database connection pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// An auth provider restored to the session's signed-in user.
    #[must_use]
    pub fn auth(&self, user: Option<AuthUser>) -> LocalAuthProvider {
        LocalAuthProvider::restore(Arc::clone(&self.inner.accounts), user)
    }

    #[must_use]
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self.inner.store.as_ref())
    }

    #[must_use]
    pub fn purchases(&self) -> PurchaseRepository<'_> {
        PurchaseRepository::new(self.inner.store.as_ref())
    }

    /// A fresh page context using the configured notification lifetime.
    #[must_use]
    pub fn page(&self) -> PageContext {
        PageContext::new(self.inner.config.notification_dismiss)
    }
}

/// Per-checkout expiry, re-evaluated on every access.
///
/// Visible checkouts are dropped once untouched for their remaining countdown
/// plus the idle margin; hidden ones never expire on idle.
struct CheckoutExpiry;

impl Expiry<String, Arc<CheckoutSession>> for CheckoutExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        checkout: &Arc<CheckoutSession>,
        _created_at: Instant,
    ) -> Option<Duration> {
        checkout.idle_timeout()
    }

    fn expire_after_read(
        &self,
        _key: &String,
        checkout: &Arc<CheckoutSession>,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        checkout.idle_timeout()
    }

    fn expire_after_update(
        &self,
        _key: &String,
        checkout: &Arc<CheckoutSession>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        checkout.idle_timeout()
    }
}
