//! HTTP error mapping.
//!
//! `HttpAppError` wraps `granite_core::AppError` so we can implement
//! `IntoResponse` for it (orphan rules prevent implementing it on the core
//! type directly). Responses carry a JSON body with the machine-readable
//! code and a client-safe message.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use granite_core::{AppError, ErrorMetadata};

/// JSON error body returned by every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    pub recoverable: bool,
}

pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

fn log_error(err: &AppError) {
    match err.log_level() {
        tracing::Level::ERROR => tracing::error!(code = err.error_code(), error = %err, "Request failed"),
        tracing::Level::WARN => tracing::warn!(code = err.error_code(), error = %err, "Request failed"),
        _ => tracing::debug!(code = err.error_code(), error = %err, "Request rejected"),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let err = self.0;
        log_error(&err);
        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: err.client_message(),
            code: err.error_code().to_string(),
            suggested_action: err.suggested_action().map(String::from),
            recoverable: err.is_recoverable(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json<T>` that runs `validator` rules after deserialization.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned + Validate,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                HttpAppError(AppError::bad_request(rejection.body_text()))
            })?;
        value.validate().map_err(AppError::from)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_maps_to_conflict() {
        let response = HttpAppError(AppError::guard("allocation is locked")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_bad_request_and_not_found() {
        let response =
            HttpAppError(AppError::bad_request("unknown action 'frobnicate'")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = HttpAppError(AppError::not_found("no such allocation")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let err = AppError::internal("pg-primary exploded");
        assert_eq!(err.client_message(), "An internal error occurred. Please try again later.");
        let response = HttpAppError(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
