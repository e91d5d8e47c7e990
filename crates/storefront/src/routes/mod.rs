//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//! GET    /health/ready                - Readiness check (database, when configured)
//! GET    /api/catalog                 - Products on sale
//!
//! # Home
//! GET    /api/home                    - Greeting and products
//! POST   /api/home/purchase           - Purchase intent
//!
//! # Login
//! GET    /api/auth/state              - Redirect check for signed-in visitors
//! GET    /api/auth/remember           - "Remember me" preload
//! POST   /api/auth/password-strength  - Password strength meter
//! POST   /api/auth/signup             - Create account
//! POST   /api/auth/signin             - Sign in
//! POST   /api/auth/reset              - Password reset email
//! POST   /api/auth/signout            - Sign out
//!
//! # Checkout
//! GET    /api/checkout                - Open or show the live checkout
//! POST   /api/checkout/payment-method - Select payment method
//! POST   /api/checkout/visibility     - Page visibility change
//! POST   /api/checkout/confirm        - Confirm purchase
//! DELETE /api/checkout                - Leave checkout
//!
//! # Profile
//! GET    /api/profile                 - Profile and purchase history
//! POST   /api/profile/name            - Rename
//! POST   /api/profile/password-reset  - Password reset email
//! POST   /api/profile/signout         - Sign out
//! GET    /api/profile/export          - Data export
//! ```

pub mod auth;
pub mod checkout;
pub mod home;
pub mod profile;
pub mod response;

pub use response::PageResponse;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::create_session_layer;
use crate::state::AppState;

/// Create the login page routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/state", get(auth::state))
        .route("/remember", get(auth::remember))
        .route("/password-strength", post(auth::password_strength))
        .route("/signup", post(auth::sign_up))
        .route("/signin", post(auth::sign_in))
        .route("/reset", post(auth::reset))
        .route("/signout", post(auth::sign_out))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).delete(checkout::close))
        .route("/payment-method", post(checkout::select_payment))
        .route("/visibility", post(checkout::visibility))
        .route("/confirm", post(checkout::confirm))
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show))
        .route("/name", post(profile::rename))
        .route("/password-reset", post(profile::password_reset))
        .route("/signout", post(profile::sign_out))
        .route("/export", get(profile::export))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/catalog", get(home::catalog))
        .route("/api/home", get(home::home))
        .route("/api/home/purchase", post(home::purchase))
        .nest("/api/auth", auth_routes())
        .nest("/api/checkout", checkout_routes())
        .nest("/api/profile", profile_routes())
}

/// The complete application: routes, sessions over `store`, and tracing.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());

    routes()
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity when a database is configured.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
