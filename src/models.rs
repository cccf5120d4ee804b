//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent persisted directory records.

use crate::auth::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Request for a sign-in nonce.
#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    pub identity: String, // base58 public key
}

/// Challenge delivered to the client for the wallet to sign.
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub domain: String,
    pub statement: String,
    pub uri: String,
    pub chain_id: String,
    pub issued_at: String,
    pub expires_at: String,
    /// Exact canonical text the wallet must sign.
    pub message: String,
}

/// Request to verify a signed sign-in message.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub identity: String,
    /// Account the wallet reports having signed with. Defaults to `identity`.
    #[serde(default)]
    pub address: Option<String>,
    pub signature: String,      // base64
    pub signed_message: String, // base64
}

/// Response after successful verification.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub authenticated: bool,
    pub identity: String,
}

// ============================================================================
// Storage Models
// ============================================================================

/// A sign-in nonce as stored in the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRecord {
    pub identity: Identity,
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl NonceRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
