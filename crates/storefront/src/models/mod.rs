//! Domain models shared by the repositories, page services and routes.

pub mod purchase;
pub mod session;
pub mod user;

pub use purchase::{AccountDetails, OrderRecord, Purchase};
pub use session::keys as session_keys;
pub use user::UserProfile;
