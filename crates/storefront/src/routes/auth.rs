//! Login page handlers.
//!
//! A successful sign-up or sign-in stores the user in the session; every
//! later request restores the auth provider from it.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::{AuthUser, ErrorCategory};
use crate::error::Result;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::page::PageContext;
use crate::routes::checkout::discard_checkout;
use crate::routes::response::PageResponse;
use crate::services::AuthService;
use crate::services::auth::{
    AuthError, PasswordStrength, SessionCheck, SignInForm, SignUpForm, clear_auth_error_later,
};
use crate::state::AppState;

/// Sign-in state as the login page sees it.
#[derive(Debug, Serialize)]
pub struct AuthStateView {
    pub check: SessionCheck,
    pub user: Option<AuthUser>,
}

#[derive(Debug, Serialize)]
pub struct RememberView {
    pub remember: bool,
}

#[derive(Debug, Deserialize)]
pub struct PasswordInput {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetInput {
    pub email: String,
}

/// How long the reset confirmation stays before the sign-in form returns.
#[derive(Debug, Serialize)]
pub struct ResetView {
    pub return_after_ms: u64,
}

/// Check whether the visitor should leave the login page.
#[instrument(skip_all)]
pub async fn state(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> PageResponse<AuthStateView> {
    let page = state.page();
    let auth = state.auth(user.clone());
    let service = AuthService::new(&auth, state.users(), &session, &page);

    let check = service.check_session(user.as_ref()).await;
    if check == SessionCheck::RecentFailure {
        drop(clear_auth_error_later(session.clone()));
    }

    PageResponse::ok(&page, AuthStateView { check, user })
}

/// Whether "remember me" starts ticked.
pub async fn remember(State(state): State<AppState>, session: Session) -> Json<RememberView> {
    let page = state.page();
    let auth = state.auth(None);
    let service = AuthService::new(&auth, state.users(), &session, &page);
    Json(RememberView {
        remember: service.remembered().await,
    })
}

/// Score a password as it is typed.
pub async fn password_strength(Json(input): Json<PasswordInput>) -> Json<PasswordStrength> {
    Json(PasswordStrength::evaluate(&input.password))
}

/// Create an account.
#[instrument(skip_all)]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<SignUpForm>,
) -> Result<PageResponse<AuthUser>> {
    let page = state.page();
    let auth = state.auth(user);
    let service = AuthService::new(&auth, state.users(), &session, &page);

    let result = service.sign_up(&form).await;
    finish(&state, &session, &page, result).await
}

/// Sign in.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<SignInForm>,
) -> Result<PageResponse<AuthUser>> {
    let page = state.page();
    let auth = state.auth(user);
    let service = AuthService::new(&auth, state.users(), &session, &page);

    let result = service.sign_in(&form).await;
    finish(&state, &session, &page, result).await
}

/// Send a password reset email.
#[instrument(skip_all)]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<ResetInput>,
) -> PageResponse<ResetView> {
    let page = state.page();
    let auth = state.auth(None);
    let service = AuthService::new(&auth, state.users(), &session, &page);

    match service.send_password_reset(&input.email).await {
        Ok(after) => PageResponse::ok(
            &page,
            ResetView {
                return_after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            },
        ),
        Err(e) => PageResponse::rejected(&page, rejection_status(&e)),
    }
}

/// Sign out.
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<PageResponse<()>> {
    let page = state.page();
    let auth = state.auth(user);
    let service = AuthService::new(&auth, state.users(), &session, &page);

    if let Err(e) = service.sign_out().await {
        tracing::warn!(error = %e, "provider sign-out failed");
    }
    discard_checkout(&state, &session).await?;
    clear_current_user(&session).await?;
    Ok(PageResponse::ok(&page, ()))
}

/// Settle the session after a sign-up or sign-in attempt.
///
/// Any attempt that reached the provider began with a sign-out, so the
/// previous user and their live checkout are gone either way.
async fn finish(
    state: &AppState,
    session: &Session,
    page: &PageContext,
    result: std::result::Result<AuthUser, AuthError>,
) -> Result<PageResponse<AuthUser>> {
    match result {
        Ok(user) => {
            discard_checkout(state, session).await?;
            session.cycle_id().await?;
            set_current_user(session, &user).await?;
            Ok(PageResponse::ok(page, user))
        }
        Err(e) => {
            if e.is_external() {
                discard_checkout(state, session).await?;
                clear_current_user(session).await?;
            }
            Ok(PageResponse::rejected(page, rejection_status(&e)))
        }
    }
}

/// HTTP status for a rejected login-page action.
fn rejection_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::TermsNotAccepted
        | AuthError::WeakPassword(_)
        | AuthError::InvalidEmail(_)
        | AuthError::UndeliverableEmail => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::Provider { source, .. } => match source.category() {
            ErrorCategory::AlreadyRegistered => StatusCode::CONFLICT,
            ErrorCategory::WeakPassword | ErrorCategory::InvalidAddress => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::NetworkUnreachable | ErrorCategory::Unavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCategory::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCategory::UnknownAccount
            | ErrorCategory::WrongPassword
            | ErrorCategory::Unclassified => StatusCode::UNAUTHORIZED,
        },
        AuthError::Profile(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ErrorCode, ProviderError};
    use crate::services::auth::AuthForm;

    fn provider(code: ErrorCode) -> AuthError {
        AuthError::Provider {
            form: AuthForm::SignIn,
            source: ProviderError::from(code),
        }
    }

    #[test]
    fn test_rejection_status() {
        assert_eq!(
            rejection_status(&AuthError::TermsNotAccepted),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            rejection_status(&provider(ErrorCode::EmailAlreadyInUse)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            rejection_status(&provider(ErrorCode::WrongPassword)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            rejection_status(&provider(ErrorCode::TooManyRequests)),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            rejection_status(&provider(ErrorCode::NetworkRequestFailed)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
