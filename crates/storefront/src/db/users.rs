//! User profile repository (`users` collection).

use chrono::{DateTime, Utc};
use serde_json::json;

use digitalhub_core::{Email, UserId};

use super::{RepositoryError, decode};
use crate::backend::store::to_document;
use crate::backend::{Document, DocumentStore, WriteMode, collections};
use crate::models::UserProfile;

/// Repository for customer profile documents.
pub struct UserRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get a profile by uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is malformed.
    pub async fn get(&self, uid: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        self.store
            .get(collections::USERS, uid.as_str())
            .await?
            .map(|doc| decode(collections::USERS, uid.as_str(), doc))
            .transpose()
    }

    /// Write a full profile, replacing any existing document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the write fails.
    pub async fn put(&self, uid: &UserId, profile: &UserProfile) -> Result<(), RepositoryError> {
        self.store
            .set(
                collections::USERS,
                uid.as_str(),
                to_document(profile)?,
                WriteMode::Replace,
            )
            .await?;
        Ok(())
    }

    /// Write the profile created at sign-up.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the write fails.
    pub async fn create(
        &self,
        uid: &UserId,
        name: Option<&str>,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, RepositoryError> {
        let profile = UserProfile {
            uid: Some(uid.clone()),
            name: name.map(str::to_owned),
            email: Some(email.as_str().to_owned()),
            created_at: Some(now),
            last_login: Some(now),
        };
        self.put(uid, &profile).await?;
        Ok(profile)
    }

    /// Record a sign-in: create the profile if it is missing, otherwise merge
    /// `lastLogin` into it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the read or write fails.
    pub async fn record_sign_in(
        &self,
        uid: &UserId,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.get(uid).await?.is_none() {
            self.create(uid, None, email, now).await?;
        } else {
            self.merge(uid, json!({ "lastLogin": now })).await?;
        }
        Ok(())
    }

    /// Set the display name, keeping every other field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Provider` if the write fails.
    pub async fn rename(&self, uid: &UserId, name: &str) -> Result<(), RepositoryError> {
        self.merge(uid, json!({ "name": name })).await
    }

    async fn merge(&self, uid: &UserId, patch: serde_json::Value) -> Result<(), RepositoryError> {
        let patch: Document = to_document(&patch)?;
        self.store
            .set(collections::USERS, uid.as_str(), patch, WriteMode::Merge)
            .await?;
        Ok(())
    }
}
