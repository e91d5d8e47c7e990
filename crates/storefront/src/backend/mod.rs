//! Hosted collaborators: the authentication provider and the document store.
//!
//! Both are expressed as object-safe async traits so page services can run
//! against the in-process emulators (tests, local development) or against
//! `PostgreSQL` in production.
//!
//! Every collaborator failure is a [`ProviderError`] carrying the provider's
//! string error code. Page services classify codes with
//! [`ErrorCode::category`] to pick the message shown to the customer.

pub mod auth;
pub mod memory;
pub mod postgres;
pub mod store;

pub use auth::{AccountDirectory, AuthProvider, AuthState, AuthSubscription, AuthUser, LocalAuthProvider};
pub use memory::{FailOn, MemoryDocumentStore};
pub use postgres::PgDocumentStore;
pub use store::{Document, DocumentStore, StoredDocument, WriteMode, collections};

use thiserror::Error;

/// Error codes reported by the hosted collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    EmailAlreadyInUse,
    WeakPassword,
    InvalidEmail,
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    UserDisabled,
    TooManyRequests,
    NetworkRequestFailed,
    PermissionDenied,
    Unavailable,
    NotFound,
    AlreadyExists,
    /// Any code this crate does not classify.
    Other(String),
}

impl ErrorCode {
    /// The provider's wire code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::InvalidEmail => "auth/invalid-email",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::UserDisabled => "auth/user-disabled",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::NetworkRequestFailed => "auth/network-request-failed",
            Self::PermissionDenied => "permission-denied",
            Self::Unavailable => "unavailable",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::Other(code) => code,
        }
    }

    /// Map the code onto the customer-facing error taxonomy.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::EmailAlreadyInUse => ErrorCategory::AlreadyRegistered,
            Self::WeakPassword => ErrorCategory::WeakPassword,
            Self::InvalidEmail => ErrorCategory::InvalidAddress,
            Self::UserNotFound => ErrorCategory::UnknownAccount,
            Self::WrongPassword => ErrorCategory::WrongPassword,
            Self::TooManyRequests => ErrorCategory::RateLimited,
            Self::NetworkRequestFailed => ErrorCategory::NetworkUnreachable,
            Self::PermissionDenied => ErrorCategory::PermissionDenied,
            Self::Unavailable => ErrorCategory::Unavailable,
            Self::InvalidCredential
            | Self::UserDisabled
            | Self::NotFound
            | Self::AlreadyExists
            | Self::Other(_) => ErrorCategory::Unclassified,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/weak-password" => Self::WeakPassword,
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/invalid-credential" => Self::InvalidCredential,
            "auth/user-disabled" => Self::UserDisabled,
            "auth/too-many-requests" => Self::TooManyRequests,
            "auth/network-request-failed" => Self::NetworkRequestFailed,
            "permission-denied" => Self::PermissionDenied,
            "unavailable" => Self::Unavailable,
            "not-found" => Self::NotFound,
            "already-exists" => Self::AlreadyExists,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer-facing classification of collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    AlreadyRegistered,
    WeakPassword,
    InvalidAddress,
    UnknownAccount,
    WrongPassword,
    RateLimited,
    NetworkUnreachable,
    PermissionDenied,
    Unavailable,
    Unclassified,
}

/// A failure reported by the auth provider or the document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ErrorCode,
    pub message: String,
}

impl ProviderError {
    /// Create an error with a code and a diagnostic message.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorCode::category`].
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl From<ErrorCode> for ProviderError {
    fn from(code: ErrorCode) -> Self {
        let message = code.as_str().to_owned();
        Self { code, message }
    }
}
