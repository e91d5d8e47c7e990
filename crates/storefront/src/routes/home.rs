//! Home page and catalog handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::catalog::PRODUCTS;
use crate::checkout::ProductView;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::routes::checkout::discard_checkout;
use crate::routes::response::PageResponse;
use crate::services::HomeService;
use crate::services::home::{Greeting, PurchaseError};
use crate::state::AppState;

/// Home page data.
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub greeting: Greeting,
    pub products: Vec<ProductView>,
}

/// Purchase intent body.
#[derive(Debug, Deserialize)]
pub struct PurchaseInput {
    pub product: String,
}

/// Products on sale.
pub async fn catalog() -> Json<Vec<ProductView>> {
    Json(PRODUCTS.iter().map(ProductView::from).collect())
}

/// Show the home page.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> PageResponse<HomeView> {
    let page = state.page();
    let service = HomeService::new(state.users(), &session, &page);
    let greeting = service.greeting(user.as_ref()).await;

    PageResponse::ok(
        &page,
        HomeView {
            greeting,
            products: PRODUCTS.iter().map(ProductView::from).collect(),
        },
    )
}

/// Start buying a product.
///
/// A new purchase replaces any checkout still live for the session.
#[instrument(skip_all, fields(product = %input.product))]
pub async fn purchase(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(input): Json<PurchaseInput>,
) -> Result<PageResponse<ProductView>> {
    let page = state.page();
    let service = HomeService::new(state.users(), &session, &page);

    Ok(match service.purchase(user.as_ref(), &input.product).await {
        Ok(product) => {
            discard_checkout(&state, &session).await?;
            PageResponse::ok(&page, ProductView::from(product))
        }
        Err(PurchaseError::Unauthenticated) => {
            PageResponse::rejected(&page, StatusCode::UNAUTHORIZED)
        }
        Err(PurchaseError::UnknownProduct(_)) => {
            PageResponse::rejected(&page, StatusCode::NOT_FOUND)
        }
    })
}
