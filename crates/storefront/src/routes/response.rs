//! Page response envelope.
//!
//! Every page endpoint answers with the page's data (when the action
//! produced any), the notifications on screen and where the page is sending
//! the customer.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::backend::ErrorCategory;
use crate::db::RepositoryError;
use crate::notify::Notification;
use crate::page::{PageContext, Redirect};

/// JSON body of a page response.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub notifications: Vec<Notification>,
    pub redirect: Option<Redirect>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> PageResponse<T> {
    /// A successful action.
    pub fn ok(page: &PageContext, data: T) -> Self {
        Self::build(page, Some(data), StatusCode::OK)
    }

    /// A rejected action; the page has already said why.
    pub fn rejected(page: &PageContext, status: StatusCode) -> Self {
        Self::build(page, None, status)
    }

    fn build(page: &PageContext, data: Option<T>, status: StatusCode) -> Self {
        // An immediate navigation is reported as a redirect with no delay.
        let redirect = page.navigator.scheduled().or_else(|| {
            page.navigator.location().map(|page| Redirect {
                page,
                after: Duration::ZERO,
            })
        });

        Self {
            data,
            notifications: page.notifications.active(),
            redirect,
            status,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T: Serialize> IntoResponse for PageResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// HTTP status for a document store failure a page already reported.
pub fn repository_status(err: &RepositoryError) -> StatusCode {
    match err.code().map(crate::backend::ErrorCode::category) {
        Some(ErrorCategory::PermissionDenied) => StatusCode::FORBIDDEN,
        Some(ErrorCategory::Unavailable | ErrorCategory::NetworkUnreachable) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
