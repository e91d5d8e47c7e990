//! Login page service.
//!
//! Sign-up, sign-in and password reset against the [`AuthProvider`], plus
//! the "already signed in" check that runs when the login page opens.
//!
//! A failed sign-up or sign-in sets the session-scoped `authError` flag so
//! the state check does not bounce the customer straight back home; the
//! flag is cleared at the start of the next attempt or shortly after the
//! next check.

mod error;

pub use error::{AuthError, AuthForm};

use std::time::Duration;

use chrono::Utc;

use digitalhub_core::Email;

use crate::backend::{AuthProvider, AuthUser};
use crate::db::UserRepository;
use crate::page::{Page, PageContext};
use crate::storage::{ClientStorage, StorageScope, keys};

/// Minimum strength accepted at sign-up.
pub const MIN_SIGNUP_STRENGTH: u8 = 50;

/// Delay before leaving the login page after a successful sign-up.
pub const SIGNUP_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Delay before leaving the login page after a sign-in, or when the
/// customer is already signed in.
pub const SIGNIN_REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// Delay before the reset form switches back to the sign-in form.
pub const RESET_FORM_RETURN_DELAY: Duration = Duration::from_secs(3);

/// Delay before a stale auth-error flag is cleared.
pub const AUTH_ERROR_CLEAR_DELAY: Duration = Duration::from_millis(1500);

// =============================================================================
// Password Strength
// =============================================================================

/// Strength meter shown under the sign-up password field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PasswordStrength {
    /// 0 to 100.
    pub score: u8,
    pub label: &'static str,
}

impl PasswordStrength {
    /// Score a password: 25 for 8+ characters, 15 more for 12+, and 15 for
    /// each of lower-case, upper-case, digit and symbol. Capped at 100.
    #[must_use]
    pub fn evaluate(password: &str) -> Self {
        let length = password.chars().count();
        let checks = [
            (length >= 8, 25_u8),
            (length >= 12, 15),
            (password.chars().any(|c| c.is_ascii_lowercase()), 15),
            (password.chars().any(|c| c.is_ascii_uppercase()), 15),
            (password.chars().any(|c| c.is_ascii_digit()), 15),
            (password.chars().any(|c| !c.is_ascii_alphanumeric()), 15),
        ];
        let score = checks
            .iter()
            .filter(|(passed, _)| *passed)
            .map(|(_, points)| points)
            .sum::<u8>()
            .min(100);

        let label = match score {
            0..25 => "Very Weak",
            25..50 => "Weak",
            50..75 => "Fair",
            _ => "Strong",
        };
        Self { score, label }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Sign-up form fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub accept_terms: bool,
}

/// Sign-in form fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

/// What the login page does when it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCheck {
    /// Nobody is signed in; show the forms.
    SignedOut,
    /// Signed in with no recent failure; leaving for the home page.
    Redirecting,
    /// Signed in, but the last attempt failed; the flag is cleared shortly.
    RecentFailure,
}

// =============================================================================
// Service
// =============================================================================

/// Login page service.
pub struct AuthService<'a> {
    auth: &'a dyn AuthProvider,
    users: UserRepository<'a>,
    storage: &'a dyn ClientStorage,
    page: &'a PageContext,
}

impl<'a> AuthService<'a> {
    /// Create a new login page service.
    #[must_use]
    pub const fn new(
        auth: &'a dyn AuthProvider,
        users: UserRepository<'a>,
        storage: &'a dyn ClientStorage,
        page: &'a PageContext,
    ) -> Self {
        Self {
            auth,
            users,
            storage,
            page,
        }
    }

    /// Create an account and its profile document.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TermsNotAccepted` or `AuthError::WeakPassword`
    /// without contacting the provider. Returns `AuthError::Provider` if the
    /// provider rejects the account and `AuthError::Profile` if the profile
    /// write fails. Every error has already been shown to the customer.
    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<AuthUser, AuthError> {
        let result = self.try_sign_up(form).await;
        self.finish_attempt(&result).await;
        let user = result?;

        tracing::info!(uid = %user.uid, "account created");
        self.page
            .notifications
            .success("Account created successfully! Welcome to DigitalHub!");
        self.page
            .navigator
            .redirect_after(Page::Home, SIGNUP_REDIRECT_DELAY);
        Ok(user)
    }

    async fn try_sign_up(&self, form: &SignUpForm) -> Result<AuthUser, AuthError> {
        if !form.accept_terms {
            return Err(AuthError::TermsNotAccepted);
        }
        let strength = PasswordStrength::evaluate(&form.password);
        if strength.score < MIN_SIGNUP_STRENGTH {
            return Err(AuthError::WeakPassword(strength.score));
        }

        self.reset_auth_state().await;
        let user = self
            .auth
            .create_account(form.email.trim(), &form.password)
            .await
            .map_err(|e| AuthError::provider(AuthForm::SignUp, e))?;

        self.users
            .create(&user.uid, Some(form.name.trim()), &user.email, Utc::now())
            .await?;
        Ok(user)
    }

    /// Sign in and record the login on the profile document.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` if the provider rejects the credentials.
    /// Profile write failures are logged and do not fail the sign-in.
    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn sign_in(&self, form: &SignInForm) -> Result<AuthUser, AuthError> {
        let result = self.try_sign_in(form).await;
        self.finish_attempt(&result).await;
        let user = result?;

        if let Err(e) = self
            .users
            .record_sign_in(&user.uid, &user.email, Utc::now())
            .await
        {
            tracing::warn!(error = %e, uid = %user.uid, "failed to update user document");
        }
        if form.remember {
            self.storage
                .set_item(StorageScope::Local, keys::REMEMBER_USER, "true")
                .await;
        }

        tracing::info!(uid = %user.uid, "signed in");
        self.page.notifications.success("Welcome back!");
        self.page
            .navigator
            .redirect_after(Page::Home, SIGNIN_REDIRECT_DELAY);
        Ok(user)
    }

    async fn try_sign_in(&self, form: &SignInForm) -> Result<AuthUser, AuthError> {
        self.reset_auth_state().await;
        self.auth
            .sign_in(form.email.trim(), &form.password)
            .await
            .map_err(|e| AuthError::provider(AuthForm::SignIn, e))
    }

    /// Request a password reset email.
    ///
    /// Returns how long the confirmation stays up before the page switches
    /// back to the sign-in form.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::UndeliverableEmail`
    /// without contacting the provider, and `AuthError::Provider` if the
    /// provider rejects the request.
    #[tracing::instrument(skip(self))]
    pub async fn send_password_reset(&self, email: &str) -> Result<Duration, AuthError> {
        let result = async {
            let email = Email::parse(email)?;
            if !email.looks_deliverable() {
                return Err(AuthError::UndeliverableEmail);
            }
            self.auth
                .send_password_reset(email.as_str())
                .await
                .map_err(|e| AuthError::provider(AuthForm::PasswordReset, e))
        }
        .await;

        if let Err(e) = &result {
            self.report(e);
        }
        result?;

        self.page
            .notifications
            .success("Password reset email sent! Check your inbox and spam folder.");
        Ok(RESET_FORM_RETURN_DELAY)
    }

    /// Decide what the login page does for the current sign-in state.
    ///
    /// A signed-in customer is sent home unless the last attempt failed. The
    /// caller clears the flag with [`clear_auth_error_later`] in that case.
    pub async fn check_session(&self, user: Option<&AuthUser>) -> SessionCheck {
        if user.is_none() {
            return SessionCheck::SignedOut;
        }
        if self
            .storage
            .get_item(StorageScope::Session, keys::AUTH_ERROR)
            .await
            .is_some()
        {
            return SessionCheck::RecentFailure;
        }

        self.page.notifications.success("Already signed in! Redirecting...");
        self.page
            .navigator
            .redirect_after(Page::Home, SIGNIN_REDIRECT_DELAY);
        SessionCheck::Redirecting
    }

    /// Whether "remember me" should start ticked.
    pub async fn remembered(&self) -> bool {
        self.storage
            .get_item(StorageScope::Local, keys::REMEMBER_USER)
            .await
            .as_deref()
            == Some("true")
    }

    /// Sign out and forget the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` if the provider fails to sign out.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth
            .sign_out()
            .await
            .map_err(|e| AuthError::provider(AuthForm::SignIn, e))
    }

    /// Best-effort sign-out and flag reset before an attempt.
    async fn reset_auth_state(&self) {
        if let Err(e) = self.auth.sign_out().await {
            tracing::debug!(error = %e, "pre-emptive sign-out failed");
        }
        self.storage
            .remove_item(StorageScope::Session, keys::AUTH_ERROR)
            .await;
    }

    /// Flag and report a failed sign-up or sign-in.
    async fn finish_attempt(&self, result: &Result<AuthUser, AuthError>) {
        let Err(e) = result else {
            return;
        };
        if e.is_external() {
            self.storage
                .set_item(StorageScope::Session, keys::AUTH_ERROR, "true")
                .await;
        }
        self.report(e);
    }

    fn report(&self, err: &AuthError) {
        if err.is_external() {
            tracing::warn!(error = %err, "authentication failed");
        } else {
            tracing::debug!(error = %err, "form rejected");
        }
        self.page.notifications.error(err.user_message());
    }
}

/// Clear the auth-error flag after [`AUTH_ERROR_CLEAR_DELAY`].
///
/// Must be called inside a Tokio runtime.
pub fn clear_auth_error_later<S>(storage: S) -> tokio::task::JoinHandle<()>
where
    S: ClientStorage + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(AUTH_ERROR_CLEAR_DELAY).await;
        storage
            .remove_item(StorageScope::Session, keys::AUTH_ERROR)
            .await;
        storage.flush().await;
    })
}
