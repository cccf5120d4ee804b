//! Sign-in API endpoints.

use crate::auth::error::Rejection;
use crate::auth::identity::Identity;
use crate::auth::message::format_timestamp;
use crate::error::AppError;
use crate::models::{NonceRequest, NonceResponse, VerifyRequest, VerifyResponse};
use crate::routes::AppState;
use crate::wallet::{SignedAssertion, WalletSignInOutput};
use axum::{extract::State, response::IntoResponse, Json};

/// POST /api/v1/auth/nonce — Issue a sign-in challenge
pub async fn request_nonce(
    State(state): State<AppState>,
    Json(req): Json<NonceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let challenge = state.auth.request(&req.identity).await.map_err(|e| {
        tracing::warn!(action = "nonce_refused", identity = %req.identity, error = %e, "Challenge not issued");
        e
    })?;

    tracing::info!(action = "challenge_issued", identity = %challenge.identity, "Sign-in challenge issued");

    Ok(Json(NonceResponse {
        issued_at: format_timestamp(&challenge.issued_at),
        expires_at: format_timestamp(&challenge.expires_at),
        nonce: challenge.nonce,
        domain: challenge.domain,
        statement: challenge.statement,
        uri: challenge.uri,
        chain_id: challenge.chain_id,
        message: challenge.message,
    }))
}

/// POST /api/v1/auth/verify — Verify a signed sign-in message
pub async fn verify_sign_in(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if Identity::parse(&req.identity).is_err() {
        tracing::warn!(action = "auth_failed", identity = %req.identity, reason = Rejection::InvalidIdentity.as_str(), "Sign-in rejected");
        return Err(AppError::SignInRejected(Rejection::InvalidIdentity));
    }

    let raw = WalletSignInOutput {
        address: req.address.unwrap_or_else(|| req.identity.clone()),
        signature: req.signature,
        signed_message: req.signed_message,
    };
    let assertion = SignedAssertion::from_wire(&raw, state.auth.wire_encoding()).map_err(|e| {
        tracing::warn!(action = "auth_failed", identity = %req.identity, reason = Rejection::FormatError.as_str(), error = %e, "Malformed sign-in proof");
        AppError::SignInRejected(Rejection::FormatError)
    })?;

    let identity = state.auth.submit(&req.identity, &assertion).await?;

    Ok(Json(VerifyResponse {
        authenticated: true,
        identity: identity.to_base58(),
    }))
}
