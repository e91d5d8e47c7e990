//! Checkout page handlers.
//!
//! A checkout outlives the request that opened it: it is held in the live
//! checkout cache under an id stored in the session. Its page context
//! collects notifications across requests, so responses report the
//! checkout's own notifications and redirects.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use digitalhub_core::PaymentMethod;

use crate::checkout::{CheckoutError, CheckoutSession, CheckoutView, ConfirmContext, OpenError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::routes::response::{PageResponse, repository_status};
use crate::state::AppState;
use crate::storage::{ClientStorage, StorageScope, keys};

#[derive(Debug, Deserialize)]
pub struct PaymentMethodInput {
    pub method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityInput {
    pub visible: bool,
}

/// Show the checkout page, opening a checkout when none is live.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<PageResponse<CheckoutView>> {
    if let Some((_, checkout)) = live_checkout(&state, &session).await? {
        let selected = session
            .get_item(StorageScope::Local, keys::SELECTED_PRODUCT)
            .await;
        let same_user = user.as_ref() == Some(checkout.user());
        if same_user && selected.as_deref() == Some(checkout.product().id) {
            return Ok(PageResponse::ok(checkout.page(), checkout.snapshot()));
        }
        discard_checkout(&state, &session).await?;
    }

    let page = state.page();
    let auth = state.auth(user);
    match CheckoutSession::open(&auth, &session, page.clone(), state.config().checkout).await {
        Ok(checkout) => {
            let id = Uuid::new_v4().to_string();
            let checkout = Arc::new(checkout);
            state
                .checkouts()
                .insert(id.clone(), Arc::clone(&checkout))
                .await;
            session.insert(session_keys::CHECKOUT_ID, &id).await?;
            Ok(PageResponse::ok(checkout.page(), checkout.snapshot()))
        }
        Err(OpenError::Unauthenticated) => {
            Ok(PageResponse::rejected(&page, StatusCode::UNAUTHORIZED))
        }
        Err(OpenError::UnknownProduct(_)) => {
            Ok(PageResponse::rejected(&page, StatusCode::NOT_FOUND))
        }
    }
}

/// Select a payment method.
#[instrument(skip_all, fields(input = ?input))]
pub async fn select_payment(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<PaymentMethodInput>,
) -> Result<PageResponse<CheckoutView>> {
    let (_, checkout) = require_checkout(&state, &session).await?;
    checkout.select_payment(input.method);
    add_breadcrumb(
        "checkout",
        "Payment method selected",
        Some(&[("method", input.method.as_str())]),
    );
    Ok(PageResponse::ok(checkout.page(), checkout.snapshot()))
}

/// Report whether the checkout page is visible.
#[instrument(skip_all, fields(input = ?input))]
pub async fn visibility(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<VisibilityInput>,
) -> Result<PageResponse<CheckoutView>> {
    let (id, checkout) = require_checkout(&state, &session).await?;
    checkout.set_visible(input.visible);
    // Re-insert so the cache re-evaluates expiry for the new visibility.
    state.checkouts().insert(id, Arc::clone(&checkout)).await;
    Ok(PageResponse::ok(checkout.page(), checkout.snapshot()))
}

/// Confirm the purchase.
///
/// The confirmation runs on its own task so a dropped connection cannot
/// interrupt the processing steps; the response waits for it.
#[instrument(skip_all)]
pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<PageResponse<CheckoutView>> {
    let (_, checkout) = require_checkout(&state, &session).await?;
    if let Some(visitor) = &user
        && visitor != checkout.user()
    {
        // Opened for someone else: it cannot record an order for this visitor.
        discard_checkout(&state, &session).await?;
        return Err(AppError::NotFound("no checkout in progress".to_string()));
    }

    let task = {
        let checkout = Arc::clone(&checkout);
        let store = Arc::clone(state.store());
        let session = session.clone();
        tokio::spawn(async move {
            let ctx = ConfirmContext {
                user: user.as_ref(),
                storage: &session,
                store: store.as_ref(),
            };
            checkout.confirm(ctx).await
        })
    };

    let result = task
        .await
        .map_err(|e| AppError::Internal(format!("checkout confirmation task failed: {e}")))?;

    let page = checkout.page();
    Ok(match result {
        Ok(_) => PageResponse::ok(page, checkout.snapshot()),
        Err(e) => PageResponse::rejected(page, rejection_status(&e)),
    })
}

/// Leave the checkout page.
#[instrument(skip_all)]
pub async fn close(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    discard_checkout(&state, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop the session's live checkout, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn discard_checkout(state: &AppState, session: &Session) -> Result<()> {
    if let Some(id) = session.remove::<String>(session_keys::CHECKOUT_ID).await? {
        // The eviction listener closes the checkout.
        state.checkouts().invalidate(&id).await;
    }
    Ok(())
}

async fn live_checkout(
    state: &AppState,
    session: &Session,
) -> Result<Option<(String, Arc<CheckoutSession>)>> {
    let Some(id) = session.get::<String>(session_keys::CHECKOUT_ID).await? else {
        return Ok(None);
    };
    Ok(state.checkouts().get(&id).await.map(|checkout| (id, checkout)))
}

async fn require_checkout(
    state: &AppState,
    session: &Session,
) -> Result<(String, Arc<CheckoutSession>)> {
    live_checkout(state, session)
        .await?
        .ok_or_else(|| AppError::NotFound("no checkout in progress".to_string()))
}

/// HTTP status for a rejected confirmation.
fn rejection_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::NoPaymentMethod => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::Unauthenticated => StatusCode::UNAUTHORIZED,
        CheckoutError::Expired => StatusCode::GONE,
        CheckoutError::UnknownProduct(_) => StatusCode::NOT_FOUND,
        CheckoutError::AlreadyCompleted | CheckoutError::InProgress => StatusCode::CONFLICT,
        CheckoutError::Persist(e) => repository_status(e),
    }
}
