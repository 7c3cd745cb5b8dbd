//! Application error taxonomy.
//!
//! `AppError` is the single error type crossing crate boundaries. The
//! `ErrorMetadata` trait attaches the HTTP status, machine-readable code,
//! and logging hints the API layer needs without coupling this crate to any
//! HTTP framework.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// A lifecycle precondition was not met. The operation is rejected with
    /// a human-readable reason and no state is mutated.
    #[error("{0}")]
    Guard(String),

    /// The request payload failed validation (bad value for a typed
    /// attribute, negative extension, empty selection, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The request itself is malformed: unknown action token, unparsable
    /// body. Distinct from `Guard`, which rejects well-formed requests.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The acting user lacks permission for the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn guard(msg: impl Into<String>) -> Self {
        Self::Guard(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Static metadata per variant: (http status, error code, recoverable,
/// suggested action, sensitive).
fn static_metadata(err: &AppError) -> (u16, &'static str, bool, Option<&'static str>, bool) {
    match err {
        AppError::Guard(_) => (
            409,
            "GUARD_FAILURE",
            true,
            Some("The allocation is not in a state that permits this operation"),
            false,
        ),
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            true,
            Some("Check the request payload and try again"),
            false,
        ),
        AppError::BadRequest(_) => (400, "BAD_REQUEST", true, None, false),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, None, false),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Contact an administrator if you believe you should have access"),
            false,
        ),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, None, false),
        AppError::Database(_) => (500, "DATABASE_ERROR", true, Some("Try again later"), true),
        AppError::Config(_) => (500, "CONFIG_ERROR", false, None, true),
        AppError::Notification(_) => (500, "NOTIFICATION_ERROR", true, None, true),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", false, Some("Try again later"), true)
        }
    }
}

/// Metadata the API layer uses to turn an `AppError` into a response.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;
    fn error_code(&self) -> &'static str;
    fn is_recoverable(&self) -> bool;
    fn suggested_action(&self) -> Option<&'static str>;
    /// Message safe to show to API clients. Sensitive variants return a
    /// generic message and keep the detail in the logs.
    fn client_message(&self) -> String;
    fn is_sensitive(&self) -> bool;
    fn log_level(&self) -> tracing::Level;
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        static_metadata(self).3
    }

    fn client_message(&self) -> String {
        if self.is_sensitive() {
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }

    fn is_sensitive(&self) -> bool {
        static_metadata(self).4
    }

    fn log_level(&self) -> tracing::Level {
        match self {
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => tracing::Level::ERROR,
            AppError::Notification(_) => tracing::Level::WARN,
            _ => tracing::Level::DEBUG,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("Invalid JSON: {err}"))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::BadRequest(format!("Invalid UUID: {err}"))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_metadata() {
        let err = AppError::guard("You cannot request a change on a locked allocation");
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "GUARD_FAILURE");
        assert!(err.is_recoverable());
        assert!(!err.is_sensitive());
        assert_eq!(
            err.client_message(),
            "You cannot request a change on a locked allocation"
        );
    }

    #[test]
    fn test_bad_request_distinct_from_guard() {
        let bad = AppError::bad_request("unknown action 'frobnicate'");
        let guard = AppError::guard("allocation is locked");
        assert_eq!(bad.http_status_code(), 400);
        assert_eq!(guard.http_status_code(), 409);
        assert_ne!(bad.error_code(), guard.error_code());
    }

    #[test]
    fn test_sensitive_errors_hide_detail() {
        let err = AppError::internal("pool exhausted on pg-primary");
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("pg-primary"));
        assert_eq!(err.http_status_code(), 500);
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(
            AppError::guard("nope").log_level(),
            tracing::Level::DEBUG
        );
        assert_eq!(
            AppError::Notification("smtp down".into()).log_level(),
            tracing::Level::WARN
        );
        assert_eq!(
            AppError::internal("boom").log_level(),
            tracing::Level::ERROR
        );
    }

    #[test]
    fn test_validation_from_validator() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("justification", validator::ValidationError::new("length"));
        let err: AppError = errors.into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.http_status_code(), 400);
    }
}
