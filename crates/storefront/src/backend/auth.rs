//! Authentication provider.
//!
//! [`AuthProvider`] is the hosted sign-in service as seen by the pages:
//! create account, sign in, sign out, password reset, and a subscription to
//! the sign-in state.
//!
//! [`LocalAuthProvider`] emulates it in-process. Accounts are stored in the
//! document store (`auth_accounts`, keyed by lower-cased email) with Argon2id
//! password hashes. The [`AccountDirectory`] holding them is shared, while
//! each browser session gets its own provider with its own sign-in state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use digitalhub_core::{Email, UserId};

use super::store::{DocumentStore, WriteMode, collections, to_document};
use super::{ErrorCode, ProviderError};

/// Minimum password length accepted by the provider.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Failed sign-ins allowed per email inside [`FAILURE_WINDOW`].
const MAX_FAILED_ATTEMPTS: usize = 5;

/// Window over which failed sign-ins are counted.
const FAILURE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Reset requests kept in the outbox; the oldest is dropped beyond this.
pub const OUTBOX_CAPACITY: usize = 100;

/// A signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: Email,
}

/// Sign-in state published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The provider has not determined the state yet.
    #[default]
    Pending,
    SignedOut,
    SignedIn(AuthUser),
}

impl AuthState {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::Pending | Self::SignedOut => None,
        }
    }

    /// Whether the provider has settled on a state.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl From<Option<AuthUser>> for AuthState {
    fn from(user: Option<AuthUser>) -> Self {
        user.map_or(Self::SignedOut, Self::SignedIn)
    }
}

/// Handle on the provider's sign-in state.
///
/// Dropping the handle (or calling [`AuthSubscription::unsubscribe`])
/// releases it.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: watch::Receiver<AuthState>,
}

impl AuthSubscription {
    #[must_use]
    pub const fn new(rx: watch::Receiver<AuthState>) -> Self {
        Self { rx }
    }

    /// Wait until the provider knows whether someone is signed in.
    ///
    /// Resolves immediately when the state is already known. A provider that
    /// goes away before settling counts as signed out.
    pub async fn first_known_state(&mut self) -> Option<AuthUser> {
        match self.rx.wait_for(AuthState::is_known).await {
            Ok(state) => state.user().cloned(),
            Err(_) => None,
        }
    }

    /// Wait for the next state change. `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<AuthState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// The latest published state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {
        tracing::debug!("auth subscription released");
    }
}

/// Hosted authentication collaborator.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError>;

    /// Sign in with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError>;

    /// Sign out the current user. Succeeds when nobody is signed in.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Send a password reset email.
    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError>;

    /// The currently signed-in user, if known.
    fn current_user(&self) -> Option<AuthUser>;

    /// Subscribe to sign-in state changes.
    fn subscribe(&self) -> AuthSubscription;
}

/// Stored credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    uid: UserId,
    email: Email,
    password_hash: String,
    created_at: DateTime<Utc>,
}

/// A password reset the provider would have emailed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetRequest {
    pub email: Email,
    pub requested_at: DateTime<Utc>,
}

/// Shared account database for [`LocalAuthProvider`]s.
pub struct AccountDirectory {
    store: Arc<dyn DocumentStore>,
    failures: Mutex<HashMap<String, Vec<Instant>>>,
    outbox: Mutex<VecDeque<PasswordResetRequest>>,
}

impl AccountDirectory {
    /// Create a directory storing accounts in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            failures: Mutex::new(HashMap::new()),
            outbox: Mutex::new(VecDeque::with_capacity(OUTBOX_CAPACITY)),
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `auth/invalid-email`, `auth/weak-password` or
    /// `auth/email-already-in-use`, or the store's error.
    #[tracing::instrument(skip(self, password))]
    pub async fn create(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let email = parse_email(email)?;

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProviderError::new(
                ErrorCode::WeakPassword,
                format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }

        let key = email.normalized();
        if self.store.get(collections::AUTH_ACCOUNTS, &key).await?.is_some() {
            return Err(email_in_use());
        }

        let record = AccountRecord {
            uid: UserId::generate(),
            email,
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        self.store
            .set(
                collections::AUTH_ACCOUNTS,
                &key,
                to_document(&record)?,
                WriteMode::Create,
            )
            .await
            .map_err(|e| {
                // Lost a race with a concurrent sign-up for the same email.
                if e.code == ErrorCode::AlreadyExists {
                    email_in_use()
                } else {
                    e
                }
            })?;

        tracing::info!(uid = %record.uid, "account created");
        Ok(AuthUser {
            uid: record.uid,
            email: record.email,
        })
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// Returns `auth/invalid-email`, `auth/user-not-found`,
    /// `auth/wrong-password` or `auth/too-many-requests`, or the store's error.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let email = parse_email(email)?;
        let key = email.normalized();

        if self.recent_failures(&key) >= MAX_FAILED_ATTEMPTS {
            tracing::warn!("sign-in rate limited");
            return Err(ProviderError::new(
                ErrorCode::TooManyRequests,
                "too many failed sign-in attempts",
            ));
        }

        let record = self.find(&key).await?.ok_or_else(|| {
            ProviderError::new(ErrorCode::UserNotFound, "no account for this email")
        })?;

        if !verify_password(password, &record.password_hash) {
            self.record_failure(&key);
            return Err(ProviderError::new(ErrorCode::WrongPassword, "wrong password"));
        }

        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);

        Ok(AuthUser {
            uid: record.uid,
            email: record.email,
        })
    }

    /// Queue a password reset email.
    ///
    /// # Errors
    ///
    /// Returns `auth/invalid-email` or `auth/user-not-found`, or the store's
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn request_reset(&self, email: &str) -> Result<(), ProviderError> {
        let email = parse_email(email)?;
        if self.find(&email.normalized()).await?.is_none() {
            return Err(ProviderError::new(
                ErrorCode::UserNotFound,
                "no account for this email",
            ));
        }

        tracing::info!(email = %email, "password reset email queued");
        let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
        if outbox.len() >= OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(PasswordResetRequest {
            email,
            requested_at: Utc::now(),
        });
        Ok(())
    }

    /// The most recent password resets, oldest first.
    #[must_use]
    pub fn reset_requests(&self) -> Vec<PasswordResetRequest> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    async fn find(&self, key: &str) -> Result<Option<AccountRecord>, ProviderError> {
        self.store
            .get(collections::AUTH_ACCOUNTS, key)
            .await?
            .map(|doc| {
                serde_json::from_value(serde_json::Value::Object(doc))
                    .map_err(|e| ProviderError::new("data-loss", e.to_string()))
            })
            .transpose()
    }

    fn recent_failures(&self, key: &str) -> usize {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(attempts) = failures.get_mut(key) else {
            return 0;
        };
        attempts.retain(|at| at.elapsed() < FAILURE_WINDOW);
        attempts.len()
    }

    fn record_failure(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_owned())
            .or_default()
            .push(Instant::now());
    }
}

/// In-process [`AuthProvider`] for one browser session.
pub struct LocalAuthProvider {
    directory: Arc<AccountDirectory>,
    state: watch::Sender<AuthState>,
}

impl LocalAuthProvider {
    /// A provider with nobody signed in.
    #[must_use]
    pub fn new(directory: Arc<AccountDirectory>) -> Self {
        Self::with_state(directory, AuthState::SignedOut)
    }

    /// A provider resuming a known sign-in state.
    #[must_use]
    pub fn restore(directory: Arc<AccountDirectory>, user: Option<AuthUser>) -> Self {
        Self::with_state(directory, user.into())
    }

    /// A provider starting in an arbitrary state, including [`AuthState::Pending`].
    #[must_use]
    pub fn with_state(directory: Arc<AccountDirectory>, state: AuthState) -> Self {
        let (state, _) = watch::channel(state);
        Self { directory, state }
    }

    /// Publish the settled sign-in state.
    pub fn settle(&self, user: Option<AuthUser>) {
        self.state.send_replace(user.into());
    }

    /// The shared account directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<AccountDirectory> {
        &self.directory
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let user = self.directory.create(email, password).await?;
        self.settle(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let user = self.directory.verify(email, password).await?;
        self.settle(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.settle(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        self.directory.request_reset(email).await
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.state.subscribe())
    }
}

fn parse_email(email: &str) -> Result<Email, ProviderError> {
    Email::parse(email).map_err(|e| ProviderError::new(ErrorCode::InvalidEmail, e.to_string()))
}

/// Hash a password using Argon2id.
fn email_in_use() -> ProviderError {
    ProviderError::new(
        ErrorCode::EmailAlreadyInUse,
        "an account already exists for this email",
    )
}

fn hash_password(password: &str) -> Result<String, ProviderError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ProviderError::new("internal", e.to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
