use std::error::Error as StdError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flog_api_types::ApiEnvelope;

use crate::application::error::ErrorReport;

/// Client API failure rendered as a `{success: false, error}` envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiEnvelope,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            report: ErrorReport::from_message(source, status, message.clone()),
            body: ApiEnvelope::failure(message),
        }
    }

    pub fn bad_request(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            "infra::http::api::session",
            StatusCode::UNAUTHORIZED,
            "authentication required",
        )
    }

    /// Failed login: the envelope deliberately carries no detail.
    pub fn rejected(source: &'static str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ApiEnvelope::rejected(),
            report: ErrorReport::from_message(source, StatusCode::FORBIDDEN, "login rejected"),
        }
    }

    /// Server-side failure; the cause is logged but not sent to the client.
    pub fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiEnvelope::failure("internal server error"),
            report: ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
