//! Authentication error types.

use thiserror::Error;

use digitalhub_core::EmailError;

use crate::backend::{ErrorCategory, ProviderError};
use crate::db::RepositoryError;

/// The login-page form an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthForm {
    SignUp,
    SignIn,
    PasswordReset,
}

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Terms of service checkbox left unticked.
    #[error("terms of service not accepted")]
    TermsNotAccepted,

    /// Password scored below the sign-up threshold.
    #[error("password too weak (strength {0})")]
    WeakPassword(u8),

    /// Address rejected before contacting the provider.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Address parsed but has no dotted domain.
    #[error("email address is not deliverable")]
    UndeliverableEmail,

    /// The auth provider rejected the request.
    #[error("auth provider error: {source}")]
    Provider {
        form: AuthForm,
        #[source]
        source: ProviderError,
    },

    /// Writing the profile document failed.
    #[error("profile write failed: {0}")]
    Profile(#[from] RepositoryError),
}

impl AuthError {
    pub(crate) const fn provider(form: AuthForm, source: ProviderError) -> Self {
        Self::Provider { form, source }
    }

    /// Message shown to the customer.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::TermsNotAccepted => "Please agree to the Terms of Service and Privacy Policy",
            Self::WeakPassword(_) => "Password is too weak. Please choose a stronger password.",
            Self::InvalidEmail(_) | Self::UndeliverableEmail => "Please enter a valid email address.",
            Self::Provider { form, source } => provider_message(*form, source.category()),
            Self::Profile(_) => "An error occurred. Please try again.",
        }
    }

    /// Whether the auth provider or document store was involved, as opposed
    /// to a form check that failed before any call.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Profile(_))
    }
}

const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";
const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";

const fn provider_message(form: AuthForm, category: ErrorCategory) -> &'static str {
    match (form, category) {
        (_, ErrorCategory::NetworkUnreachable) => NETWORK_MESSAGE,
        (_, ErrorCategory::InvalidAddress) => INVALID_EMAIL_MESSAGE,

        (AuthForm::SignUp, ErrorCategory::AlreadyRegistered) => {
            "This email is already registered. Try signing in instead."
        }
        (AuthForm::SignUp, ErrorCategory::WeakPassword) => {
            "Password should be at least 6 characters long."
        }
        (AuthForm::SignUp, _) => "An error occurred. Please try again.",

        (AuthForm::SignIn, ErrorCategory::UnknownAccount) => {
            "No account found with this email. Try signing up instead."
        }
        (AuthForm::SignIn, ErrorCategory::WrongPassword) => "Incorrect password. Please try again.",
        (AuthForm::SignIn, ErrorCategory::RateLimited) => {
            "Too many failed attempts. Please try again later."
        }
        (AuthForm::SignIn, _) => "Invalid email or password.",

        (AuthForm::PasswordReset, ErrorCategory::UnknownAccount) => {
            "No account found with this email address."
        }
        (AuthForm::PasswordReset, _) => "Failed to send reset email. Please try again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ErrorCode;

    fn provider_error(form: AuthForm, code: ErrorCode) -> AuthError {
        AuthError::provider(form, ProviderError::from(code))
    }

    #[test]
    fn test_messages_depend_on_form() {
        assert_eq!(
            provider_error(AuthForm::SignIn, ErrorCode::UserNotFound).user_message(),
            "No account found with this email. Try signing up instead."
        );
        assert_eq!(
            provider_error(AuthForm::PasswordReset, ErrorCode::UserNotFound).user_message(),
            "No account found with this email address."
        );
        assert_eq!(
            provider_error(AuthForm::SignUp, ErrorCode::UserNotFound).user_message(),
            "An error occurred. Please try again."
        );
    }

    #[test]
    fn test_shared_categories() {
        for form in [AuthForm::SignUp, AuthForm::SignIn, AuthForm::PasswordReset] {
            assert_eq!(
                provider_error(form, ErrorCode::NetworkRequestFailed).user_message(),
                NETWORK_MESSAGE
            );
            assert_eq!(
                provider_error(form, ErrorCode::InvalidEmail).user_message(),
                INVALID_EMAIL_MESSAGE
            );
        }
    }

    #[test]
    fn test_unclassified_fallbacks() {
        assert_eq!(
            provider_error(AuthForm::SignIn, ErrorCode::InvalidCredential).user_message(),
            "Invalid email or password."
        );
        assert_eq!(
            provider_error(AuthForm::SignIn, ErrorCode::TooManyRequests).user_message(),
            "Too many failed attempts. Please try again later."
        );
        assert!(!AuthError::TermsNotAccepted.is_external());
    }
}
