//! Page services.
//!
//! Each service borrows the collaborators a page needs for the duration of
//! one request and reports outcomes through the page's notifications and
//! navigator.
//!
//! # Services
//!
//! - `auth` - Login page: sign-up, sign-in, password reset, session check
//! - `home` - Home page: purchase intent, navigation greeting
//! - `profile` - Profile page: profile, purchase history, account actions
//!
//! The checkout page lives in [`crate::checkout`] because its session
//! outlives a single request.

pub mod auth;
pub mod home;
pub mod profile;

pub use auth::{AuthError, AuthService};
pub use home::HomeService;
pub use profile::{ProfileError, ProfileService};
