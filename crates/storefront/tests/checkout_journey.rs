//! Customer journeys across the page services, against in-memory
//! collaborators: sign up, pick a product, check out, review the history.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use digitalhub_core::{PaymentMethod, Severity};
use digitalhub_storefront::backend::{
    AccountDirectory, AuthUser, DocumentStore, ErrorCode, FailOn, LocalAuthProvider,
    MemoryDocumentStore, collections,
};
use digitalhub_storefront::checkout::credentials::PASSWORD_CHARSET;
use digitalhub_storefront::checkout::sequencer::INVALID_PRODUCT_REDIRECT_DELAY;
use digitalhub_storefront::checkout::timer::EXPIRY_REDIRECT_DELAY;
use digitalhub_storefront::checkout::{
    CheckoutError, CheckoutSession, CheckoutSettings, ConfirmContext, OpenError, SequencerState,
};
use digitalhub_storefront::db::{PurchaseRepository, UserRepository};
use digitalhub_storefront::page::{Page, PageContext};
use digitalhub_storefront::services::auth::SignUpForm;
use digitalhub_storefront::services::{AuthService, HomeService, ProfileService};
use digitalhub_storefront::storage::{ClientStorage, MemoryStorage, StorageScope, keys};

const PASSWORD: &str = "Str0ng!Passw0rd";

struct Shop {
    store: Arc<MemoryDocumentStore>,
    directory: Arc<AccountDirectory>,
    storage: Arc<MemoryStorage>,
}

impl Shop {
    fn new() -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let directory = Arc::new(AccountDirectory::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>
        ));
        Self {
            store,
            directory,
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    fn auth(&self, user: Option<AuthUser>) -> LocalAuthProvider {
        LocalAuthProvider::restore(Arc::clone(&self.directory), user)
    }

    async fn sign_up(&self, email: &str) -> AuthUser {
        let auth = self.auth(None);
        let page = PageContext::default();
        AuthService::new(
            &auth,
            UserRepository::new(self.store.as_ref()),
            self.storage.as_ref(),
            &page,
        )
        .sign_up(&SignUpForm {
            name: "Ada Lovelace".to_owned(),
            email: email.to_owned(),
            password: PASSWORD.to_owned(),
            accept_terms: true,
        })
        .await
        .unwrap()
    }

    async fn choose(&self, user: &AuthUser, product: &str) -> PageContext {
        let page = PageContext::default();
        HomeService::new(
            UserRepository::new(self.store.as_ref()),
            self.storage.as_ref(),
            &page,
        )
        .purchase(Some(user), product)
        .await
        .unwrap();
        page
    }

    async fn open(&self, user: Option<AuthUser>, page: PageContext) -> Result<CheckoutSession, OpenError> {
        let auth = self.auth(user);
        CheckoutSession::open(&auth, self.storage.as_ref(), page, CheckoutSettings::default()).await
    }

    fn ctx<'a>(&'a self, user: &'a AuthUser) -> ConfirmContext<'a> {
        ConfirmContext {
            user: Some(user),
            storage: self.storage.as_ref(),
            store: self.store.as_ref(),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_purchase_appears_in_history() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;

    let home = shop.choose(&user, "netflix").await;
    assert_eq!(home.navigator.location(), Some(Page::Checkout));

    let checkout = shop.open(Some(user.clone()), PageContext::default()).await.unwrap();
    checkout.select_payment(PaymentMethod::Bitcoin);
    let confirmation = checkout.confirm(shop.ctx(&user)).await.unwrap();
    assert_eq!(checkout.state(), SequencerState::Succeeded);

    let auth = shop.auth(Some(user.clone()));
    let page = PageContext::default();
    let profile = ProfileService::new(
        &auth,
        UserRepository::new(shop.store.as_ref()),
        PurchaseRepository::new(shop.store.as_ref()),
        &page,
    )
    .open(Some(&user))
    .await
    .unwrap();

    assert_eq!(profile.profile.name, "Ada Lovelace");
    assert_eq!(profile.history.count, 1);
    assert_eq!(profile.history.total_saved, "$3.00");
    let card = profile.history.purchases.first().unwrap();
    assert_eq!(card.order_id, confirmation.order_id);
    assert_eq!(card.status_label, "Delivered");
    assert_eq!(card.payment_method, PaymentMethod::Bitcoin);
    assert_eq!(card.account, confirmation.account);
}

#[tokio::test(start_paused = true)]
async fn test_one_record_per_successful_confirmation() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;
    let mut order_ids = HashSet::new();

    for product in ["netflix", "spotify", "prime"] {
        shop.choose(&user, product).await;
        let checkout = shop.open(Some(user.clone()), PageContext::default()).await.unwrap();

        // Validation failure first: nothing is written.
        let writes = shop.store.write_count();
        assert!(matches!(
            checkout.confirm(shop.ctx(&user)).await,
            Err(CheckoutError::NoPaymentMethod)
        ));
        assert_eq!(shop.store.write_count(), writes);

        checkout.select_payment(PaymentMethod::Usdt);
        let confirmation = checkout.confirm(shop.ctx(&user)).await.unwrap();
        assert!(order_ids.insert(confirmation.order_id.clone()));
        assert_eq!(confirmation.account.password.chars().count(), 12);
        assert!(
            confirmation
                .account
                .password
                .bytes()
                .all(|b| PASSWORD_CHARSET.contains(&b))
        );

        // A second confirmation of the same checkout is refused.
        assert!(matches!(
            checkout.confirm(shop.ctx(&user)).await,
            Err(CheckoutError::AlreadyCompleted)
        ));
        checkout.close();
    }

    assert_eq!(shop.store.len(collections::PURCHASES).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_last_selected_method_is_recorded() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;
    shop.choose(&user, "spotify").await;
    let checkout = shop.open(Some(user.clone()), PageContext::default()).await.unwrap();

    checkout.select_payment(PaymentMethod::Bitcoin);
    checkout.select_payment(PaymentMethod::Usdt);
    assert_eq!(checkout.selected_payment(), Some(PaymentMethod::Usdt));
    checkout.confirm(shop.ctx(&user)).await.unwrap();

    let purchases = PurchaseRepository::new(shop.store.as_ref())
        .list_for_user(&user.uid)
        .await
        .unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(
        purchases.first().unwrap().record.payment_method,
        PaymentMethod::Usdt
    );
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_then_retry() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;
    shop.choose(&user, "prime").await;
    let page = PageContext::default();
    let checkout = shop.open(Some(user.clone()), page.clone()).await.unwrap();
    checkout.select_payment(PaymentMethod::Binance);

    shop.store
        .inject_failure(FailOn::Writes, ErrorCode::PermissionDenied);
    let err = checkout.confirm(shop.ctx(&user)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Persist(_)));
    assert_eq!(checkout.state(), SequencerState::Idle);
    assert!(checkout.can_confirm());
    let errors = page.notifications.shown_with(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().unwrap().message, err.user_message());

    shop.store.clear_failure();
    checkout.confirm(shop.ctx(&user)).await.unwrap();
    assert_eq!(shop.store.len(collections::PURCHASES).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_signed_out_visitor_is_sent_to_login() {
    let shop = Shop::new();
    let page = PageContext::default();

    let err = shop.open(None, page.clone()).await.unwrap_err();
    assert_eq!(err, OpenError::Unauthenticated);
    assert_eq!(page.navigator.location(), None);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(page.navigator.location(), Some(Page::Login));
}

#[tokio::test(start_paused = true)]
async fn test_expired_checkout_cannot_confirm() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;
    shop.choose(&user, "netflix").await;
    let page = PageContext::default();
    let checkout = shop.open(Some(user.clone()), page.clone()).await.unwrap();
    checkout.select_payment(PaymentMethod::Usdt);

    tokio::time::sleep(Duration::from_millis(900_500)).await;
    assert_eq!(checkout.remaining_secs(), 0);
    assert!(!checkout.can_confirm());
    assert_eq!(page.notifications.shown_with(Severity::Error).len(), 1);

    let err = checkout.confirm(shop.ctx(&user)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Expired));
    assert_eq!(shop.store.len(collections::PURCHASES).await, 0);

    tokio::time::sleep(EXPIRY_REDIRECT_DELAY).await;
    assert_eq!(page.navigator.location(), Some(Page::Home));
}

#[tokio::test(start_paused = true)]
async fn test_confirm_without_a_user_writes_nothing() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;
    shop.choose(&user, "netflix").await;
    let page = PageContext::default();
    let checkout = shop.open(Some(user.clone()), page.clone()).await.unwrap();
    checkout.select_payment(PaymentMethod::Bitcoin);
    let writes = shop.store.write_count();

    let err = checkout
        .confirm(ConfirmContext {
            user: None,
            storage: shop.storage.as_ref(),
            store: shop.store.as_ref(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Unauthenticated));
    assert_eq!(shop.store.write_count(), writes);
    let errors = page.notifications.shown_with(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().unwrap().message, "Please login to complete purchase");
    assert_eq!(page.navigator.scheduled(), None);
    assert_eq!(checkout.state(), SequencerState::Idle);
    assert!(checkout.can_confirm());
}

#[tokio::test(start_paused = true)]
async fn test_confirm_with_a_withdrawn_product_goes_home() {
    let shop = Shop::new();
    let user = shop.sign_up("ada@example.com").await;
    shop.choose(&user, "netflix").await;
    let page = PageContext::default();
    let checkout = shop.open(Some(user.clone()), page.clone()).await.unwrap();
    checkout.select_payment(PaymentMethod::Usdt);
    let writes = shop.store.write_count();

    // Another tab replaced the selection with something no longer on sale.
    shop.storage
        .set_item(StorageScope::Local, keys::SELECTED_PRODUCT, "youtube")
        .await;

    let err = checkout.confirm(shop.ctx(&user)).await.unwrap_err();

    assert!(matches!(err, CheckoutError::UnknownProduct(ref id) if id == "youtube"));
    assert_eq!(shop.store.write_count(), writes);
    assert_eq!(shop.store.len(collections::PURCHASES).await, 0);
    let errors = page.notifications.shown_with(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.first().unwrap().message,
        "Invalid product selected. Redirecting to store."
    );
    let redirect = page.navigator.scheduled().unwrap();
    assert_eq!(redirect.page, Page::Home);
    assert_eq!(redirect.after, INVALID_PRODUCT_REDIRECT_DELAY);
    assert_eq!(checkout.state(), SequencerState::Idle);

    tokio::time::sleep(INVALID_PRODUCT_REDIRECT_DELAY).await;
    assert_eq!(page.navigator.location(), Some(Page::Home));
}
