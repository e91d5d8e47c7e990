//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, `PostgreSQL` or in-memory store)

pub mod auth;
pub mod session;

pub use auth::{OptionalAuth, clear_current_user, set_current_user};
pub use session::create_session_layer;
