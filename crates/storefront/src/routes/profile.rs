//! Profile page handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::ErrorCategory;
use crate::error::Result;
use crate::middleware::{OptionalAuth, clear_current_user};
use crate::routes::checkout::discard_checkout;
use crate::routes::response::{PageResponse, repository_status};
use crate::services::{ProfileError, ProfileService};
use crate::services::profile::ProfilePage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RenameInput {
    pub name: String,
}

/// Show the profile page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> PageResponse<ProfilePage> {
    let page = state.page();
    let auth = state.auth(user.clone());
    let service = ProfileService::new(&auth, state.users(), state.purchases(), &page);

    match service.open(user.as_ref()).await {
        Ok(profile) => PageResponse::ok(&page, profile),
        Err(e) => PageResponse::rejected(&page, rejection_status(&e)),
    }
}

/// Change the display name.
#[instrument(skip_all)]
pub async fn rename(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(input): Json<RenameInput>,
) -> PageResponse<String> {
    let page = state.page();
    let auth = state.auth(user.clone());
    let service = ProfileService::new(&auth, state.users(), state.purchases(), &page);

    match service.rename(user.as_ref(), &input.name).await {
        Ok(name) => PageResponse::ok(&page, name),
        Err(e) => PageResponse::rejected(&page, rejection_status(&e)),
    }
}

/// Send a password reset email to the signed-in address.
#[instrument(skip_all)]
pub async fn password_reset(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> PageResponse<()> {
    let page = state.page();
    let auth = state.auth(user.clone());
    let service = ProfileService::new(&auth, state.users(), state.purchases(), &page);

    match service.request_password_reset(user.as_ref()).await {
        Ok(()) => PageResponse::ok(&page, ()),
        Err(e) => PageResponse::rejected(&page, rejection_status(&e)),
    }
}

/// Sign out from the profile page.
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<PageResponse<()>> {
    let page = state.page();
    let auth = state.auth(user);
    let service = ProfileService::new(&auth, state.users(), state.purchases(), &page);

    if let Err(e) = service.sign_out().await {
        return Ok(PageResponse::rejected(&page, rejection_status(&e)));
    }
    discard_checkout(&state, &session).await?;
    clear_current_user(&session).await?;
    Ok(PageResponse::ok(&page, ()))
}

/// Download everything stored about the signed-in customer.
#[instrument(skip_all)]
pub async fn export(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> Response {
    let page = state.page();
    let auth = state.auth(user.clone());
    let service = ProfileService::new(&auth, state.users(), state.purchases(), &page);

    match service.export(user.as_ref()).await {
        Ok(export) => {
            let filename = format!(
                "attachment; filename=\"digitalhub-data-{}.json\"",
                export.exported_at.format("%Y-%m-%d")
            );
            let mut response = PageResponse::ok(&page, export).into_response();
            if let Ok(value) = filename.parse() {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }
            response
        }
        Err(e) => PageResponse::<()>::rejected(&page, rejection_status(&e)).into_response(),
    }
}

/// HTTP status for a rejected profile action.
fn rejection_status(err: &ProfileError) -> StatusCode {
    match err {
        ProfileError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ProfileError::EmptyName => StatusCode::UNPROCESSABLE_ENTITY,
        ProfileError::Repository(e) => repository_status(e),
        ProfileError::Provider(e) => match e.category() {
            ErrorCategory::UnknownAccount => StatusCode::NOT_FOUND,
            ErrorCategory::InvalidAddress => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::NetworkUnreachable | ErrorCategory::Unavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}
