//! Error types and Axum response conversions.

use crate::auth::error::{AuthError, Rejection};
use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    /// A sign-in that did not authenticate. Only the coarse reason is sent.
    #[error("Sign-in rejected: {0}")]
    SignInRejected(Rejection),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
            AppError::SignInRejected(rejection) => {
                let status = if rejection.is_malformed_request() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::UNAUTHORIZED
                };
                let body = Json(json!({
                    "authenticated": false,
                    "reason": rejection.public_reason(),
                }));
                (status, body).into_response()
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Internal(format!("Storage error: {}", err))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(rejection) => AppError::SignInRejected(rejection),
            AuthError::Storage(e) => e.into(),
            AuthError::Message(e) => AppError::Internal(format!("Sign-in message: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::message::FormatError;
    use axum::http::StatusCode;

    /// Extract status code and JSON body from an AppError response.
    async fn error_response(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let (status, body) = error_response(AppError::Internal(
            "Redis connection refused at 10.0.0.5:6379".to_string(),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_failed_proofs_are_indistinguishable() {
        let proofs = [
            Rejection::NonceNotFound,
            Rejection::NonceExpired,
            Rejection::NonceMismatch,
            Rejection::SignatureInvalid,
            Rejection::AddressMismatch,
            Rejection::MessageMismatch,
        ];
        for rejection in proofs {
            let (status, body) = error_response(AppError::SignInRejected(rejection)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(
                body,
                json!({ "authenticated": false, "reason": "authentication_failed" })
            );
        }
    }

    #[tokio::test]
    async fn test_malformed_sign_in_is_bad_request() {
        for rejection in [Rejection::InvalidIdentity, Rejection::FormatError] {
            let (status, body) = error_response(AppError::SignInRejected(rejection)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["reason"], "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_a_rejection() {
        let err = AuthError::Storage(StorageError::Corrupt("bad json".to_string()));
        let (status, body) = error_response(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.get("authenticated").is_none());
    }

    #[test]
    fn test_from_auth_error() {
        assert!(matches!(
            AppError::from(AuthError::Rejected(Rejection::NonceExpired)),
            AppError::SignInRejected(Rejection::NonceExpired)
        ));
        assert!(matches!(
            AppError::from(AuthError::Message(FormatError::MissingLine("URI"))),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_from_redis_error() {
        let redis_err = redis::RedisError::from((
            redis::ErrorKind::IoError,
            "test context",
            "connection refused".to_string(),
        ));
        let app_err = AppError::from(StorageError::from(redis_err));
        match app_err {
            AppError::Internal(msg) => assert!(msg.contains("Redis error")),
            _ => panic!("Expected Internal variant"),
        }
    }
}
