//! Session-related types.
//!
//! The signed-in identity is stored in the `tower-sessions` session as an
//! [`AuthUser`](crate::backend::AuthUser). Client storage entries share the
//! same session under prefixed keys.

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key of the live checkout held for this browser session.
    pub const CHECKOUT_ID: &str = "checkout_id";

    /// Prefix for client storage entries persisted indefinitely.
    pub const LOCAL_STORAGE_PREFIX: &str = "local:";

    /// Prefix for client storage entries scoped to the browser session.
    pub const SESSION_STORAGE_PREFIX: &str = "session:";
}
