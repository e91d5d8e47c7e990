//! Profile page service.
//!
//! Loads the customer's profile (creating the document on first visit) and
//! purchase history, and handles the account actions: rename, password
//! reset, sign-out and data export.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use digitalhub_core::{Email, OrderId, OrderStatus, PaymentMethod, Price, PurchaseId, UserId};

use crate::backend::{AuthProvider, AuthUser, ErrorCategory, ErrorCode, ProviderError};
use crate::catalog::{self, DisplayInfo};
use crate::db::{PurchaseRepository, RepositoryError, UserRepository};
use crate::models::{AccountDetails, Purchase, UserProfile};
use crate::page::{Page, PageContext};

/// Delay before a signed-out visitor is sent to the login page.
pub const LOGIN_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Delay before leaving the page after signing out.
pub const SIGN_OUT_REDIRECT_DELAY: Duration = Duration::from_millis(500);

/// Avatar size on the profile card.
const AVATAR_SIZE: u32 = 180;

/// Avatar size in the navigation bar.
const NAV_AVATAR_SIZE: u32 = 32;

/// Errors from profile page actions.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("name is empty")]
    EmptyName,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("auth provider error: {0}")]
    Provider(#[from] ProviderError),
}

// =============================================================================
// Views
// =============================================================================

/// Profile card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub uid: UserId,
    pub name: String,
    pub email: Email,
    pub member_since: String,
    pub avatar_url: String,
    pub nav_avatar_url: String,
}

/// One purchase as rendered in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseCard {
    pub id: PurchaseId,
    pub order_id: OrderId,
    pub product: DisplayInfo,
    pub purchase_date: DateTime<Utc>,
    pub formatted_date: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub price: String,
    pub savings: String,
    pub payment_method: PaymentMethod,
    pub account: AccountDetails,
}

impl From<&Purchase> for PurchaseCard {
    fn from(purchase: &Purchase) -> Self {
        let record = &purchase.record;
        Self {
            id: purchase.id.clone(),
            order_id: record.order_id.clone(),
            product: catalog::display_info(&record.product_id),
            purchase_date: record.purchase_date,
            formatted_date: record.purchase_date.format("%b %-d, %Y, %I:%M %p").to_string(),
            status: record.status,
            status_label: record.status.label(),
            price: usd(record.price),
            savings: usd(record.savings()),
            payment_method: record.payment_method,
            account: record.account_details.clone(),
        }
    }
}

/// Purchase history with its totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurchaseHistory {
    pub purchases: Vec<PurchaseCard>,
    pub count: usize,
    pub total_saved: String,
}

impl PurchaseHistory {
    fn from_purchases(purchases: &[Purchase]) -> Self {
        let total: Decimal = purchases.iter().map(|p| p.record.savings()).sum();
        Self {
            purchases: purchases.iter().map(PurchaseCard::from).collect(),
            count: purchases.len(),
            total_saved: usd(total),
        }
    }
}

/// Everything the profile page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfilePage {
    pub profile: ProfileView,
    pub history: PurchaseHistory,
}

/// A download of everything stored about the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub exported_at: DateTime<Utc>,
    pub uid: UserId,
    pub email: Email,
    pub profile: Option<UserProfile>,
    pub purchases: Vec<Purchase>,
}

// =============================================================================
// Service
// =============================================================================

/// Profile page service.
pub struct ProfileService<'a> {
    auth: &'a dyn AuthProvider,
    users: UserRepository<'a>,
    purchases: PurchaseRepository<'a>,
    page: &'a PageContext,
}

impl<'a> ProfileService<'a> {
    #[must_use]
    pub const fn new(
        auth: &'a dyn AuthProvider,
        users: UserRepository<'a>,
        purchases: PurchaseRepository<'a>,
        page: &'a PageContext,
    ) -> Self {
        Self {
            auth,
            users,
            purchases,
            page,
        }
    }

    /// Load the page for `user`.
    ///
    /// Load failures are shown to the customer and degrade the page (the
    /// name falls back to the email's local part, the history to empty).
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Unauthenticated`, redirecting to login, when
    /// nobody is signed in.
    #[tracing::instrument(skip_all)]
    pub async fn open(&self, user: Option<&AuthUser>) -> Result<ProfilePage, ProfileError> {
        let Some(user) = user else {
            self.page
                .notifications
                .error("Please login to access your profile");
            self.page
                .navigator
                .redirect_after(Page::Login, LOGIN_REDIRECT_DELAY);
            return Err(ProfileError::Unauthenticated);
        };

        let profile = self.load_profile(user).await;
        let history = match self.purchases.list_for_user(&user.uid).await {
            Ok(purchases) => PurchaseHistory::from_purchases(&purchases),
            Err(e) => {
                tracing::error!(error = %e, uid = %user.uid, "failed to load purchase history");
                self.page
                    .notifications
                    .error(load_message(&e, "Error loading purchase history"));
                PurchaseHistory::from_purchases(&[])
            }
        };

        Ok(ProfilePage { profile, history })
    }

    async fn load_profile(&self, user: &AuthUser) -> ProfileView {
        let stored = match self.fetch_or_create(user).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::error!(error = %e, uid = %user.uid, "failed to load profile");
                self.page
                    .notifications
                    .error(load_message(&e, "Error loading profile data"));
                None
            }
        };

        let name = stored.as_ref().map_or_else(
            || user.email.local_part().to_owned(),
            |p| p.display_name(&user.email),
        );
        let member_since = stored
            .as_ref()
            .and_then(|p| p.created_at)
            .unwrap_or_else(Utc::now)
            .format("%b %Y")
            .to_string();

        ProfileView {
            uid: user.uid.clone(),
            name,
            email: user.email.clone(),
            member_since,
            avatar_url: avatar_url(&user.email, AVATAR_SIZE),
            nav_avatar_url: avatar_url(&user.email, NAV_AVATAR_SIZE),
        }
    }

    async fn fetch_or_create(&self, user: &AuthUser) -> Result<UserProfile, RepositoryError> {
        if let Some(profile) = self.users.get(&user.uid).await? {
            return Ok(profile);
        }
        let profile = UserProfile {
            name: Some(user.email.local_part().to_owned()),
            email: Some(user.email.as_str().to_owned()),
            created_at: Some(Utc::now()),
            ..UserProfile::default()
        };
        self.users.put(&user.uid, &profile).await?;
        tracing::info!(uid = %user.uid, "user document created on profile visit");
        Ok(profile)
    }

    /// Change the display name.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::EmptyName` for a blank name (nothing is
    /// written), or `ProfileError::Repository` if the write fails.
    #[tracing::instrument(skip(self, user), fields(uid = ?user.map(|u| &u.uid)))]
    pub async fn rename(&self, user: Option<&AuthUser>, name: &str) -> Result<String, ProfileError> {
        let Some(user) = user else {
            self.page.notifications.error("Please login to edit profile");
            return Err(ProfileError::Unauthenticated);
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }

        if let Err(e) = self.users.rename(&user.uid, name).await {
            tracing::error!(error = %e, "failed to update profile");
            self.page.notifications.error("Error updating profile");
            return Err(e.into());
        }
        self.page
            .notifications
            .success("Profile updated successfully!");
        Ok(name.to_owned())
    }

    /// Send a password reset email to the signed-in address.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Unauthenticated` or `ProfileError::Provider`.
    #[tracing::instrument(skip_all)]
    pub async fn request_password_reset(&self, user: Option<&AuthUser>) -> Result<(), ProfileError> {
        let Some(user) = user else {
            self.page
                .notifications
                .error("You must be logged in to change password");
            return Err(ProfileError::Unauthenticated);
        };

        if let Err(e) = self.auth.send_password_reset(user.email.as_str()).await {
            tracing::warn!(error = %e, uid = %user.uid, "password reset failed");
            let message = match e.code {
                ErrorCode::InvalidEmail => "Invalid email address.",
                ErrorCode::UserNotFound => "User not found.",
                _ => "Failed to send reset email. Please try again.",
            };
            self.page.notifications.error(message);
            return Err(e.into());
        }
        self.page
            .notifications
            .success("Password reset email sent! Check your inbox.");
        Ok(())
    }

    /// Sign out and leave for the home page.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Provider` if the provider fails to sign out.
    pub async fn sign_out(&self) -> Result<(), ProfileError> {
        if let Err(e) = self.auth.sign_out().await {
            tracing::error!(error = %e, "sign-out failed");
            self.page
                .notifications
                .error("Error signing out. Please try again.");
            return Err(e.into());
        }
        self.page.notifications.success("Signed out successfully");
        self.page
            .navigator
            .redirect_after(Page::Home, SIGN_OUT_REDIRECT_DELAY);
        Ok(())
    }

    /// Collect the profile and every purchase for download.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Unauthenticated` or `ProfileError::Repository`.
    #[tracing::instrument(skip_all)]
    pub async fn export(&self, user: Option<&AuthUser>) -> Result<DataExport, ProfileError> {
        let user = user.ok_or(ProfileError::Unauthenticated)?;
        let result = async {
            Ok::<_, RepositoryError>(DataExport {
                exported_at: Utc::now(),
                uid: user.uid.clone(),
                email: user.email.clone(),
                profile: self.users.get(&user.uid).await?,
                purchases: self.purchases.list_for_user(&user.uid).await?,
            })
        }
        .await;

        match result {
            Ok(export) => {
                self.page
                    .notifications
                    .success("Data export prepared! Download started.");
                Ok(export)
            }
            Err(e) => {
                tracing::error!(error = %e, uid = %user.uid, "data export failed");
                self.page
                    .notifications
                    .error(load_message(&e, "Error preparing data export"));
                Err(e.into())
            }
        }
    }
}

/// Gravatar-style identicon URL derived from the email.
#[must_use]
pub fn avatar_url(email: &Email, size: u32) -> String {
    let hash: String = STANDARD
        .encode(email.as_str())
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    format!("https://www.gravatar.com/avatar/{hash}?d=identicon&s={size}")
}

fn usd(amount: Decimal) -> String {
    Price::new(amount, digitalhub_core::CurrencyCode::USD).display()
}

fn load_message(err: &RepositoryError, fallback: &'static str) -> &'static str {
    match err.code().map(ErrorCode::category) {
        Some(ErrorCategory::PermissionDenied) => "Permission denied. Check your account permissions.",
        Some(ErrorCategory::Unavailable | ErrorCategory::NetworkUnreachable) => {
            "Profile service unavailable. Check your connection."
        }
        _ => fallback,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use digitalhub_core::Severity;

    use super::*;
    use crate::backend::{
        AccountDirectory, DocumentStore, FailOn, LocalAuthProvider, MemoryDocumentStore,
    };
    use crate::models::OrderRecord;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        auth: LocalAuthProvider,
        page: PageContext,
        user: AuthUser,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryDocumentStore::new());
            let directory = Arc::new(AccountDirectory::new(
                Arc::clone(&store) as Arc<dyn DocumentStore>
            ));
            let user = directory.create("ada@example.com", "Secret123!").await.unwrap();
            Self {
                auth: LocalAuthProvider::restore(directory, Some(user.clone())),
                store,
                page: PageContext::default(),
                user,
            }
        }

        fn service(&self) -> ProfileService<'_> {
            ProfileService::new(
                &self.auth,
                UserRepository::new(self.store.as_ref()),
                PurchaseRepository::new(self.store.as_ref()),
                &self.page,
            )
        }

        fn record(&self, product_id: &str, price: i64, original: i64) -> OrderRecord {
            OrderRecord {
                user_id: self.user.uid.clone(),
                product_id: product_id.to_owned(),
                product_name: product_id.to_owned(),
                price: Decimal::new(price, 2),
                original_price: Decimal::new(original, 2),
                purchase_date: Utc.with_ymd_and_hms(2025, 3, 7, 15, 4, 0).unwrap(),
                order_id: OrderId::new("DHTEST"),
                status: OrderStatus::Completed,
                payment_method: PaymentMethod::Usdt,
                payment_address: "addr".into(),
                account_details: AccountDetails {
                    email: "coolstar1@gmail.com".into(),
                    password: "abcdefghijkl".into(),
                },
            }
        }
    }

    #[test]
    fn test_avatar_url() {
        let email = Email::parse("a@b.co").unwrap();
        // base64("a@b.co") = "YUBiLmNv"
        assert_eq!(
            avatar_url(&email, 32),
            "https://www.gravatar.com/avatar/YUBiLmNv?d=identicon&s=32"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_requires_user() {
        let fx = Fixture::new().await;
        let err = fx.service().open(None).await.unwrap_err();
        assert!(matches!(err, ProfileError::Unauthenticated));
        assert_eq!(fx.page.navigator.scheduled().unwrap().page, Page::Login);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_visit_creates_document() {
        let fx = Fixture::new().await;
        let page = fx.service().open(Some(&fx.user)).await.unwrap();

        assert_eq!(page.profile.name, "ada");
        assert_eq!(page.history.count, 0);
        assert_eq!(page.history.total_saved, "$0.00");

        let stored = UserRepository::new(fx.store.as_ref())
            .get(&fx.user.uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name.as_deref(), Some("ada"));
        assert!(stored.created_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_cards_and_totals() {
        let fx = Fixture::new().await;
        let purchases = PurchaseRepository::new(fx.store.as_ref());
        purchases.create(&fx.record("netflix", 1299, 1599)).await.unwrap();
        purchases.create(&fx.record("disney", 799, 999)).await.unwrap();

        let page = fx.service().open(Some(&fx.user)).await.unwrap();
        assert_eq!(page.history.count, 2);
        assert_eq!(page.history.total_saved, "$5.00");

        let card = page.history.purchases.first().unwrap();
        assert_eq!(card.status_label, "Delivered");
        assert_eq!(card.formatted_date, "Mar 7, 2025, 03:04 PM");
        assert!(
            page.history
                .purchases
                .iter()
                .any(|c| c.product.name == "Disney Plus" && c.savings == "$2.00")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_degrades_page() {
        let fx = Fixture::new().await;
        fx.store.inject_failure(FailOn::Reads, ErrorCode::PermissionDenied);

        let page = fx.service().open(Some(&fx.user)).await.unwrap();

        assert_eq!(page.profile.name, "ada");
        let errors = fx.page.notifications.shown_with(Severity::Error);
        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .all(|n| n.message == "Permission denied. Check your account permissions.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_trims_and_rejects_blank() {
        let fx = Fixture::new().await;
        let service = fx.service();

        assert!(matches!(
            service.rename(Some(&fx.user), "   ").await,
            Err(ProfileError::EmptyName)
        ));
        assert_eq!(fx.store.write_count(), 1);

        service.rename(Some(&fx.user), "  Ada L. ").await.unwrap();
        let stored = UserRepository::new(fx.store.as_ref())
            .get(&fx.user.uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name.as_deref(), Some("Ada L."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_redirects_home() {
        let fx = Fixture::new().await;
        fx.service().sign_out().await.unwrap();

        assert_eq!(fx.auth.current_user(), None);
        tokio::time::sleep(SIGN_OUT_REDIRECT_DELAY).await;
        assert_eq!(fx.page.navigator.location(), Some(Page::Home));
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_reset_and_export() {
        let fx = Fixture::new().await;
        fx.service()
            .request_password_reset(Some(&fx.user))
            .await
            .unwrap();
        assert_eq!(fx.auth.directory().reset_requests().len(), 1);

        PurchaseRepository::new(fx.store.as_ref())
            .create(&fx.record("spotify", 999, 1299))
            .await
            .unwrap();
        let export = fx.service().export(Some(&fx.user)).await.unwrap();
        assert_eq!(export.purchases.len(), 1);
        assert!(export.profile.is_none());

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["purchases"][0]["productId"], "spotify");
    }
}
