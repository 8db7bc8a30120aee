/// Error Handling Module
///
/// A small closed set of error kinds shared by every layer of the service:
/// 1. Domain errors returned by components (validation, token, auth, store, config)
/// 2. The unified `AppError` used for control flow in the session flows
/// 3. HTTP mapping with a generic client message and a detailed audit log entry
///
/// Every authentication failure carries its precise cause for the audit log,
/// but all of them leave the service as the same opaque 401.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::identity::UserId;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for client input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    /// The request is well formed but the account is not in a state that allows it
    InvalidState(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} bytes)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::InvalidState(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Reasons a token string failed verification.
///
/// Only used for diagnostics; callers collapse all of them into `Unauthorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::BadSignature => write!(f, "token signature does not match"),
            TokenError::Expired => write!(f, "token has expired"),
        }
    }
}

impl StdError for TokenError {}

/// Authentication failures, one variant per audit cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    TokenRevoked,
    InvalidToken(TokenError),
    InvalidSubject,
    InvalidCredentials,
    UnknownIdentity,
    AccountDisabled(UserId),
    StaleToken(UserId),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "token not present or not a bearer token"),
            AuthError::TokenRevoked => {
                write!(f, "token has been revoked or the account has been updated")
            }
            AuthError::InvalidToken(e) => write!(f, "invalid token: {}", e),
            AuthError::InvalidSubject => write!(f, "token does not carry a valid user id"),
            AuthError::InvalidCredentials => write!(f, "invalid email or password"),
            AuthError::UnknownIdentity => write!(f, "identity referenced by the request does not exist"),
            AuthError::AccountDisabled(id) => write!(f, "user {} has been disabled", id),
            AuthError::StaleToken(id) => {
                write!(f, "user {} has been updated since the token was issued", id)
            }
        }
    }
}

impl StdError for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::InvalidToken(err)
    }
}

/// Identity store errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same unique key already exists
    Duplicate(String),
    NotFound,
    /// The record is not in a state that allows the requested update
    Rejected(ValidationError),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate(msg) => write!(f, "Duplicate entry: {}", msg),
            StoreError::NotFound => write!(f, "Record not found"),
            StoreError::Rejected(e) => write!(f, "Update rejected: {}", e),
            StoreError::Backend(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Duplicate("email already registered".to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type returned by the session flows and route handlers
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Conflict(String),
    Auth(AuthError),
    Config(ConfigError),
    /// Hashing, signing or store backend failure
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(AuthError::InvalidToken(err))
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => AppError::Conflict(msg),
            StoreError::NotFound => AppError::Auth(AuthError::UnknownIdentity),
            StoreError::Rejected(e) => AppError::Validation(e),
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, also present in the audit log entry
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                e.to_string(),
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ENTRY".to_string(),
                msg.clone(),
            ),
            // Never tell the client which check failed.
            AppError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED".to_string(),
                "Invalid or expired credentials".to_string(),
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR".to_string(),
                "Server configuration error".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "Internal server error".to_string(),
            ),
        };

        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            code,
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Conflict(msg) => {
                tracing::warn!(request_id = request_id, error = %msg, "Duplicate entry attempt");
            }
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => {
                    tracing::warn!(request_id = request_id, cause = %e, "Invalid credentials attempt");
                }
                AuthError::AccountDisabled(user_id) | AuthError::StaleToken(user_id) => {
                    tracing::warn!(
                        request_id = request_id,
                        user_id = %user_id,
                        cause = %e,
                        "Authentication rejected"
                    );
                }
                _ => {
                    tracing::warn!(request_id = request_id, cause = %e, "Authentication error");
                }
            },
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::TooShort("password".to_string(), 8);
        assert_eq!(err.to_string(), "password is too short (minimum 8 characters)");
    }

    #[test]
    fn test_store_duplicate_becomes_conflict() {
        let app_err: AppError = StoreError::Duplicate("email".to_string()).into();
        assert!(matches!(app_err, AppError::Conflict(_)));
        assert_eq!(app_err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_store_rejection_becomes_bad_request() {
        let rejected = ValidationError::InvalidState("user has already been disabled".to_string());
        let app_err: AppError = StoreError::Rejected(rejected.clone()).into();
        assert!(matches!(&app_err, AppError::Validation(e) if *e == rejected));
        assert_eq!(app_err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_all_auth_causes_share_one_client_response() {
        let causes = vec![
            AuthError::MissingToken,
            AuthError::TokenRevoked,
            AuthError::InvalidToken(TokenError::Expired),
            AuthError::InvalidToken(TokenError::BadSignature),
            AuthError::InvalidCredentials,
            AuthError::AccountDisabled(UserId::new(7)),
            AuthError::StaleToken(UserId::new(7)),
        ];

        let responses: Vec<_> = causes
            .into_iter()
            .map(|cause| {
                let (status, body) =
                    <AppError as ErrorHandler>::error_response(&AppError::Auth(cause), "req-1");
                (status, body.code, body.message)
            })
            .collect();

        for response in &responses {
            assert_eq!(response, &responses[0]);
        }
        assert_eq!(responses[0].0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = AppError::Internal("bcrypt exploded".to_string());
        let (status, body) = <AppError as ErrorHandler>::error_response(&err, "req-2");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("bcrypt"));
        assert_eq!(body.error_id, "req-2");
    }
}
