//! Checkout session workflow.
//!
//! One [`CheckoutSession`] per browser session: the product chosen on the
//! home page, the countdown, the payment selection and the confirmation
//! sequencer. Every method takes `&self` so a session can be shared between
//! concurrent requests (a snapshot may be taken while a confirmation plays
//! its animation).
//!
//! # Confirmation
//!
//! 1. Validate: payment method selected, customer signed in, time left, and
//!    the stored product selection still names a product on sale.
//! 2. Persist: issue an order id and synthetic credentials, then write one
//!    order record.
//! 3. Animate: activate each processing step in turn.
//! 4. Succeed: stop the countdown and reveal the credentials.
//!
//! Any failure raises exactly one notification and leaves the session ready
//! for another attempt.

pub mod credentials;
pub mod payment;
pub mod sequencer;
pub mod timer;

pub use payment::{PaymentOption, PaymentSelection};
pub use sequencer::{CheckoutError, CheckoutEvent, Sequencer, SequencerState};
pub use timer::{Countdown, CountdownTimer, Urgency};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

use digitalhub_core::{OrderId, OrderStatus, PaymentMethod, PurchaseId};

use crate::backend::{AuthProvider, AuthSubscription, AuthUser, DocumentStore};
use crate::catalog::{self, Product};
use crate::db::PurchaseRepository;
use crate::models::{AccountDetails, OrderRecord};
use crate::page::{Page, PageContext};
use crate::storage::{ClientStorage, StorageScope, keys};

/// Delay before leaving a checkout that cannot be shown.
pub const OPEN_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// How long an unattended checkout outlives its countdown.
pub const DEFAULT_IDLE_MARGIN: Duration = Duration::from_secs(60);

/// Timing of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Countdown length.
    pub duration: Duration,
    /// Delay between processing steps.
    pub step_interval: Duration,
    /// Pause after the last processing step.
    pub final_pause: Duration,
    /// How long a visible checkout is kept after its countdown would have
    /// run out without any request touching it.
    pub idle_margin: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            duration: timer::DEFAULT_DURATION,
            step_interval: sequencer::DEFAULT_STEP_INTERVAL,
            final_pause: sequencer::DEFAULT_FINAL_PAUSE,
            idle_margin: DEFAULT_IDLE_MARGIN,
        }
    }
}

/// Why a checkout page could not be shown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    #[error("no authenticated user")]
    Unauthenticated,

    #[error("unknown product: {0:?}")]
    UnknownProduct(Option<String>),
}

/// What a confirmation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub purchase_id: PurchaseId,
    pub order_id: OrderId,
    pub product_name: &'static str,
    pub account: AccountDetails,
}

/// Collaborators a confirmation needs.
#[derive(Clone, Copy)]
pub struct ConfirmContext<'a> {
    /// The customer signed in at the time of confirmation.
    pub user: Option<&'a AuthUser>,
    pub storage: &'a dyn ClientStorage,
    pub store: &'a dyn DocumentStore,
}

/// Product as rendered on the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub image: &'static str,
    pub features: [&'static str; 4],
    pub price: String,
    pub original_price: String,
    pub savings_percent: Decimal,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            image: product.image,
            features: product.features,
            price: product.price().display(),
            original_price: product.reference_price().display(),
            savings_percent: product.savings_percent(),
        }
    }
}

/// Everything the checkout page shows.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutView {
    pub product: ProductView,
    pub payment_options: Vec<PaymentOption>,
    pub selected_method: Option<PaymentMethod>,
    pub can_confirm: bool,
    pub remaining_secs: u32,
    pub remaining_display: String,
    pub progress: f64,
    pub urgency: Urgency,
    pub expired: bool,
    pub state: SequencerState,
    pub steps: [&'static str; 4],
    pub active_step: Option<usize>,
    pub confirmation: Option<Confirmation>,
}

/// One customer's checkout.
pub struct CheckoutSession {
    product: &'static Product,
    user: AuthUser,
    page: PageContext,
    settings: CheckoutSettings,
    timer: CountdownTimer,
    selection: Mutex<PaymentSelection>,
    sequencer: Sequencer,
    subscription: Mutex<Option<AuthSubscription>>,
    confirmation: Mutex<Option<Confirmation>>,
}

impl CheckoutSession {
    /// Open the checkout page.
    ///
    /// Waits for the first known sign-in state, resolves the product stored
    /// by the home page and starts the countdown.
    ///
    /// # Errors
    ///
    /// Returns `OpenError::Unauthenticated` (and schedules the redirect to
    /// login) when nobody is signed in, or `OpenError::UnknownProduct` (and
    /// schedules the redirect home) when the stored selection is missing or
    /// not on sale. No countdown is started in either case.
    #[tracing::instrument(skip_all)]
    pub async fn open(
        auth: &dyn AuthProvider,
        storage: &dyn ClientStorage,
        page: PageContext,
        settings: CheckoutSettings,
    ) -> Result<Self, OpenError> {
        let mut subscription = auth.subscribe();
        let Some(user) = subscription.first_known_state().await else {
            page.notifications.error("Please login to complete purchase");
            page.navigator.redirect_after(Page::Login, OPEN_REDIRECT_DELAY);
            return Err(OpenError::Unauthenticated);
        };

        let selected = storage
            .get_item(StorageScope::Local, keys::SELECTED_PRODUCT)
            .await;
        let Some(product) = selected.as_deref().and_then(catalog::find) else {
            tracing::warn!(product = ?selected, "checkout opened without a valid product");
            page.notifications.error("Error loading product data");
            page.navigator.redirect_after(Page::Home, OPEN_REDIRECT_DELAY);
            return Err(OpenError::UnknownProduct(selected));
        };

        tracing::info!(uid = %user.uid, product = product.id, "checkout opened");
        let timer = CountdownTimer::start(settings.duration, page.clone());

        Ok(Self {
            product,
            user,
            page,
            settings,
            timer,
            selection: Mutex::new(PaymentSelection::default()),
            sequencer: Sequencer::new(),
            subscription: Mutex::new(Some(subscription)),
            confirmation: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn product(&self) -> &'static Product {
        self.product
    }

    /// The customer the checkout was opened for.
    #[must_use]
    pub const fn user(&self) -> &AuthUser {
        &self.user
    }

    #[must_use]
    pub const fn page(&self) -> &PageContext {
        &self.page
    }

    /// Select a payment method, deselecting any other.
    pub fn select_payment(&self, method: PaymentMethod) -> Option<PaymentMethod> {
        let previous = lock(&self.selection).select(method);
        tracing::debug!(%method, "payment method selected");
        previous
    }

    #[must_use]
    pub fn selected_payment(&self) -> Option<PaymentMethod> {
        lock(&self.selection).selected()
    }

    /// Report page visibility to the countdown.
    pub fn set_visible(&self, visible: bool) {
        self.timer.set_visible(visible);
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.timer.is_visible()
    }

    /// How long the checkout may go untouched before it is dropped.
    ///
    /// A hidden page keeps its checkout: the countdown is frozen and resumes
    /// where it stopped once the page is visible again.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.is_visible().then(|| {
            Duration::from_secs(u64::from(self.remaining_secs())) + self.settings.idle_margin
        })
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.timer.remaining_secs()
    }

    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.sequencer.subscribe()
    }

    /// Whether the confirm button is enabled.
    #[must_use]
    pub fn can_confirm(&self) -> bool {
        let state = self.sequencer.state();
        lock(&self.selection).can_confirm()
            && self.timer.remaining_secs() > 0
            && !state.is_busy()
            && state != SequencerState::Succeeded
    }

    /// Run a confirmation to completion.
    ///
    /// The future should be driven to completion (spawn it when the caller
    /// may be cancelled): the processing animation is not cancellable.
    ///
    /// # Errors
    ///
    /// Returns the `CheckoutError` that stopped the attempt. The matching
    /// notification has already been shown.
    #[tracing::instrument(skip_all, fields(product = self.product.id))]
    pub async fn confirm(&self, ctx: ConfirmContext<'_>) -> Result<Confirmation, CheckoutError> {
        if let Err(err) = self.sequencer.begin() {
            self.report(&err);
            return Err(err);
        }

        match self.run_confirmation(ctx).await {
            Ok(confirmation) => Ok(confirmation),
            Err(err) => {
                self.report(&err);
                self.sequencer.fail(&err);
                Err(err)
            }
        }
    }

    async fn run_confirmation(&self, ctx: ConfirmContext<'_>) -> Result<Confirmation, CheckoutError> {
        let method = self
            .selected_payment()
            .ok_or(CheckoutError::NoPaymentMethod)?;
        let user = ctx.user.ok_or(CheckoutError::Unauthenticated)?;
        if self.timer.remaining_secs() == 0 {
            return Err(CheckoutError::Expired);
        }

        let selected = ctx
            .storage
            .get_item(StorageScope::Local, keys::SELECTED_PRODUCT)
            .await
            .unwrap_or_default();
        let product = catalog::find(&selected)
            .ok_or_else(|| CheckoutError::UnknownProduct(selected.clone()))?;

        self.sequencer.persisting();
        let order_id = credentials::next_order_id();
        let account = credentials::generate_account(&mut rand::rng(), product.id);
        let record = OrderRecord {
            user_id: user.uid.clone(),
            product_id: product.id.to_owned(),
            product_name: product.name.to_owned(),
            price: product.price().amount,
            original_price: product.reference_price().amount,
            purchase_date: Utc::now(),
            order_id: order_id.clone(),
            status: OrderStatus::Completed,
            payment_method: method,
            payment_address: payment::deposit_address(method).to_owned(),
            account_details: account.clone(),
        };
        let purchase_id = PurchaseRepository::new(ctx.store).create(&record).await?;
        tracing::info!(
            uid = %user.uid,
            %order_id,
            %purchase_id,
            %method,
            "order recorded"
        );

        self.sequencer.animating();
        for index in 0..sequencer::PROCESSING_STEPS.len() {
            self.sequencer.activate_step(index);
            tokio::time::sleep(self.settings.step_interval).await;
        }
        tokio::time::sleep(self.settings.final_pause).await;

        self.timer.stop();
        let confirmation = Confirmation {
            purchase_id,
            order_id: order_id.clone(),
            product_name: product.name,
            account: account.clone(),
        };
        *lock(&self.confirmation) = Some(confirmation.clone());
        self.sequencer.succeed(order_id, account);
        Ok(confirmation)
    }

    fn report(&self, err: &CheckoutError) {
        match err {
            CheckoutError::Persist(e) => tracing::error!(error = %e, "failed to record order"),
            other => tracing::info!(error = %other, "checkout confirmation rejected"),
        }
        self.page.notifications.show(err.user_message(), err.severity());
        if let Some(redirect) = err.redirect() {
            self.page
                .navigator
                .redirect_after(redirect.page, redirect.after);
        }
    }

    /// The confirmation, once the checkout succeeded.
    #[must_use]
    pub fn confirmation(&self) -> Option<Confirmation> {
        lock(&self.confirmation).clone()
    }

    /// Current state of the page.
    #[must_use]
    pub fn snapshot(&self) -> CheckoutView {
        let countdown = self.timer.snapshot();
        CheckoutView {
            product: ProductView::from(self.product),
            payment_options: payment::options(),
            selected_method: self.selected_payment(),
            can_confirm: self.can_confirm(),
            remaining_secs: countdown.remaining(),
            remaining_display: countdown.display(),
            progress: countdown.progress(),
            urgency: countdown.urgency(),
            expired: countdown.is_expired(),
            state: self.sequencer.state(),
            steps: sequencer::PROCESSING_STEPS,
            active_step: self.sequencer.step(),
            confirmation: self.confirmation(),
        }
    }

    /// Leave the page: stop the countdown and release the auth subscription.
    pub fn close(&self) {
        self.timer.stop();
        self.page.navigator.cancel();
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.unsubscribe();
        }
        tracing::debug!(uid = %self.user.uid, "checkout closed");
    }
}

impl std::fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("product", &self.product.id)
            .field("uid", &self.user.uid)
            .field("timer", &self.timer)
            .field("state", &self.sequencer.state())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use digitalhub_core::{Email, Severity, UserId};

    use super::*;
    use crate::backend::{
        AccountDirectory, ErrorCode, FailOn, LocalAuthProvider, MemoryDocumentStore, collections,
    };
    use crate::storage::MemoryStorage;

    fn user() -> AuthUser {
        AuthUser {
            uid: UserId::new("u1"),
            email: Email::parse("ada@example.com").unwrap(),
        }
    }

    fn provider(store: &Arc<MemoryDocumentStore>, user: Option<AuthUser>) -> LocalAuthProvider {
        let directory = Arc::new(AccountDirectory::new(Arc::clone(store) as Arc<dyn DocumentStore>));
        LocalAuthProvider::restore(directory, user)
    }

    async fn storage_with(product: &str) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage
            .set_item(StorageScope::Local, keys::SELECTED_PRODUCT, product)
            .await;
        storage
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_requires_user() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, None);
        let storage = storage_with("netflix").await;
        let page = PageContext::default();

        let err = CheckoutSession::open(&auth, &storage, page.clone(), CheckoutSettings::default())
            .await
            .unwrap_err();

        assert_eq!(err, OpenError::Unauthenticated);
        assert_eq!(page.navigator.scheduled().unwrap().page, Page::Login);
        tokio::time::sleep(OPEN_REDIRECT_DELAY).await;
        assert_eq!(page.navigator.location(), Some(Page::Login));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_unknown_product() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("youtube").await;
        let page = PageContext::default();

        let err = CheckoutSession::open(&auth, &storage, page.clone(), CheckoutSettings::default())
            .await
            .unwrap_err();

        assert_eq!(err, OpenError::UnknownProduct(Some("youtube".into())));
        assert_eq!(
            page.notifications.shown_with(Severity::Error).first().unwrap().message,
            "Error loading product data"
        );
        assert_eq!(page.navigator.scheduled().unwrap().page, Page::Home);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_shows_product_and_options() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("spotify").await;
        let session = CheckoutSession::open(
            &auth,
            &storage,
            PageContext::default(),
            CheckoutSettings::default(),
        )
        .await
        .unwrap();

        let view = session.snapshot();
        assert_eq!(view.product.name, "Spotify Premium");
        assert_eq!(view.product.price, "$9.99");
        assert_eq!(view.payment_options.len(), 3);
        assert_eq!(view.remaining_display, "15:00");
        assert!(!view.can_confirm);
        assert_eq!(view.state, SequencerState::Idle);

        session.select_payment(PaymentMethod::Bitcoin);
        assert!(session.snapshot().can_confirm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_without_method_writes_nothing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("netflix").await;
        let page = PageContext::default();
        let session =
            CheckoutSession::open(&auth, &storage, page.clone(), CheckoutSettings::default())
                .await
                .unwrap();

        let user = user();
        let err = session
            .confirm(ConfirmContext {
                user: Some(&user),
                storage: &storage,
                store: store.as_ref(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::NoPaymentMethod));
        assert_eq!(store.write_count(), 0);
        assert_eq!(page.notifications.shown_with(Severity::Warning).len(), 1);
        assert_eq!(session.state(), SequencerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_succeeds_and_stops_timer() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("prime").await;
        let session = CheckoutSession::open(
            &auth,
            &storage,
            PageContext::default(),
            CheckoutSettings::default(),
        )
        .await
        .unwrap();
        session.select_payment(PaymentMethod::Usdt);

        let user = user();
        let confirmation = session
            .confirm(ConfirmContext {
                user: Some(&user),
                storage: &storage,
                store: store.as_ref(),
            })
            .await
            .unwrap();

        assert_eq!(confirmation.product_name, "Prime Video");
        assert_eq!(confirmation.account.password.len(), 12);
        assert_eq!(store.len(collections::PURCHASES).await, 1);
        assert_eq!(session.state(), SequencerState::Succeeded);

        let remaining = session.remaining_secs();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.remaining_secs(), remaining);
        assert!(!session.can_confirm());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_retryable() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("netflix").await;
        let page = PageContext::default();
        let session =
            CheckoutSession::open(&auth, &storage, page.clone(), CheckoutSettings::default())
                .await
                .unwrap();
        session.select_payment(PaymentMethod::Binance);
        store.inject_failure(FailOn::Writes, ErrorCode::PermissionDenied);

        let user = user();
        let ctx = ConfirmContext {
            user: Some(&user),
            storage: &storage,
            store: store.as_ref(),
        };
        assert!(matches!(
            session.confirm(ctx).await,
            Err(CheckoutError::Persist(_))
        ));

        let errors = page.notifications.shown_with(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.first().unwrap().message,
            "Payment access denied. Check your account permissions."
        );
        assert_eq!(session.state(), SequencerState::Idle);
        assert!(session.can_confirm());

        store.clear_failure();
        session.confirm(ctx).await.unwrap();
        assert_eq!(store.len(collections::PURCHASES).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_countdown() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("netflix").await;
        let session = CheckoutSession::open(
            &auth,
            &storage,
            PageContext::default(),
            CheckoutSettings::default(),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.close();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.remaining_secs(), 898);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_checkout_has_no_idle_timeout() {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = provider(&store, Some(user()));
        let storage = storage_with("netflix").await;
        let session = CheckoutSession::open(
            &auth,
            &storage,
            PageContext::default(),
            CheckoutSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            session.idle_timeout(),
            Some(Duration::from_secs(900) + DEFAULT_IDLE_MARGIN)
        );

        session.set_visible(false);
        assert_eq!(session.idle_timeout(), None);
        tokio::time::sleep(Duration::from_secs(1200)).await;
        assert_eq!(session.idle_timeout(), None);

        session.set_visible(true);
        let remaining = Duration::from_secs(u64::from(session.remaining_secs()));
        assert!(!remaining.is_zero());
        assert_eq!(session.idle_timeout(), Some(remaining + DEFAULT_IDLE_MARGIN));
    }
}
