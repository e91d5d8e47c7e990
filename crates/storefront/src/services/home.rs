//! Home page service: purchase intent and the navigation greeting.

use std::time::Duration;

use serde::Serialize;

use crate::backend::AuthUser;
use crate::catalog::{self, Product};
use crate::db::UserRepository;
use crate::page::{Page, PageContext};
use crate::storage::{ClientStorage, StorageScope, keys};

/// Delay before a signed-out customer is sent to the login page.
pub const LOGIN_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Why a purchase could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("unknown product: {0:?}")]
    UnknownProduct(String),
}

/// Navigation label for the signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Greeting {
    pub signed_in: bool,
    pub label: String,
}

/// Home page service.
pub struct HomeService<'a> {
    users: UserRepository<'a>,
    storage: &'a dyn ClientStorage,
    page: &'a PageContext,
}

impl<'a> HomeService<'a> {
    #[must_use]
    pub const fn new(
        users: UserRepository<'a>,
        storage: &'a dyn ClientStorage,
        page: &'a PageContext,
    ) -> Self {
        Self {
            users,
            storage,
            page,
        }
    }

    /// Start buying `product_id`: remember the choice and go to checkout.
    ///
    /// # Errors
    ///
    /// Returns `PurchaseError::Unauthenticated` (redirecting to login) when
    /// nobody is signed in, and `PurchaseError::UnknownProduct` when the id
    /// is not on sale. Nothing is stored in either case.
    #[tracing::instrument(skip(self, user))]
    pub async fn purchase(
        &self,
        user: Option<&AuthUser>,
        product_id: &str,
    ) -> Result<&'static Product, PurchaseError> {
        if user.is_none() {
            self.page
                .notifications
                .error("Please login to purchase products");
            self.page
                .navigator
                .redirect_after(Page::Login, LOGIN_REDIRECT_DELAY);
            return Err(PurchaseError::Unauthenticated);
        }

        let Some(product) = catalog::find(product_id) else {
            tracing::warn!("purchase of unknown product");
            self.page
                .notifications
                .error("This product is not available.");
            return Err(PurchaseError::UnknownProduct(product_id.to_owned()));
        };

        self.storage
            .set_item(StorageScope::Local, keys::SELECTED_PRODUCT, product.id)
            .await;
        self.page.navigator.navigate(Page::Checkout);
        Ok(product)
    }

    /// The name shown in the navigation bar.
    ///
    /// Read failures are logged and fall back to the email's local part.
    pub async fn greeting(&self, user: Option<&AuthUser>) -> Greeting {
        let Some(user) = user else {
            return Greeting {
                signed_in: false,
                label: "Login".to_owned(),
            };
        };

        let label = match self.users.get(&user.uid).await {
            Ok(Some(profile)) => profile.display_name(&user.email),
            Ok(None) => user.email.local_part().to_owned(),
            Err(e) => {
                tracing::warn!(error = %e, uid = %user.uid, "failed to load user document");
                user.email.local_part().to_owned()
            }
        };
        Greeting {
            signed_in: true,
            label,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use digitalhub_core::{Email, Severity, UserId};

    use super::*;
    use crate::backend::{ErrorCode, FailOn, MemoryDocumentStore};
    use crate::storage::MemoryStorage;

    fn user() -> AuthUser {
        AuthUser {
            uid: UserId::new("u1"),
            email: Email::parse("swiftmoon@example.com").unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_stores_selection() {
        let store = MemoryDocumentStore::new();
        let storage = MemoryStorage::new();
        let page = PageContext::default();
        let home = HomeService::new(UserRepository::new(&store), &storage, &page);

        let product = home.purchase(Some(&user()), "netflix").await.unwrap();

        assert_eq!(product.id, "netflix");
        assert_eq!(
            storage
                .get_item(StorageScope::Local, keys::SELECTED_PRODUCT)
                .await
                .as_deref(),
            Some("netflix")
        );
        assert_eq!(page.navigator.location(), Some(Page::Checkout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_signed_out_redirects_to_login() {
        let store = MemoryDocumentStore::new();
        let storage = MemoryStorage::new();
        let page = PageContext::default();
        let home = HomeService::new(UserRepository::new(&store), &storage, &page);

        let err = home.purchase(None, "netflix").await.unwrap_err();

        assert_eq!(err, PurchaseError::Unauthenticated);
        assert!(
            storage
                .get_item(StorageScope::Local, keys::SELECTED_PRODUCT)
                .await
                .is_none()
        );
        tokio::time::sleep(LOGIN_REDIRECT_DELAY).await;
        assert_eq!(page.navigator.location(), Some(Page::Login));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_unknown_product() {
        let store = MemoryDocumentStore::new();
        let storage = MemoryStorage::new();
        let page = PageContext::default();
        let home = HomeService::new(UserRepository::new(&store), &storage, &page);

        let err = home.purchase(Some(&user()), "youtube").await.unwrap_err();

        assert_eq!(err, PurchaseError::UnknownProduct("youtube".into()));
        assert_eq!(page.notifications.shown_with(Severity::Error).len(), 1);
        assert_eq!(page.navigator.location(), None);
    }

    #[tokio::test]
    async fn test_greeting() {
        let store = MemoryDocumentStore::new();
        let storage = MemoryStorage::new();
        let page = PageContext::default();
        let users = UserRepository::new(&store);
        let home = HomeService::new(UserRepository::new(&store), &storage, &page);

        assert_eq!(home.greeting(None).await.label, "Login");
        assert_eq!(home.greeting(Some(&user())).await.label, "swiftmoon");

        users
            .create(&user().uid, Some("Ada"), &user().email, Utc::now())
            .await
            .unwrap();
        assert_eq!(home.greeting(Some(&user())).await.label, "Ada");

        store.inject_failure(FailOn::Reads, ErrorCode::Unavailable);
        assert_eq!(home.greeting(Some(&user())).await.label, "swiftmoon");
    }
}
