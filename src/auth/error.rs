//! Sign-in failure taxonomy.

use crate::auth::message::FormatError;
use crate::auth::nonce::NonceError;
use crate::storage::StorageError;

/// Why a sign-in attempt was rejected.
///
/// These are expected outcomes, not faults. The precise kind is logged; the
/// HTTP layer only exposes [`Rejection::public_reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("invalid identity")]
    InvalidIdentity,

    #[error("nonce not found")]
    NonceNotFound,

    #[error("nonce expired")]
    NonceExpired,

    #[error("nonce mismatch")]
    NonceMismatch,

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("address mismatch")]
    AddressMismatch,

    #[error("format error")]
    FormatError,

    /// The echoed message names the issued nonce but differs from the
    /// message built for it.
    #[error("signed message does not match the challenge")]
    MessageMismatch,

    #[error("wallet declined")]
    WalletDeclined,

    #[error("wallet timed out")]
    WalletTimeout,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::InvalidIdentity => "invalid_identity",
            Rejection::NonceNotFound => "nonce_not_found",
            Rejection::NonceExpired => "nonce_expired",
            Rejection::NonceMismatch => "nonce_mismatch",
            Rejection::SignatureInvalid => "signature_invalid",
            Rejection::AddressMismatch => "address_mismatch",
            Rejection::FormatError => "format_error",
            Rejection::MessageMismatch => "message_mismatch",
            Rejection::WalletDeclined => "wallet_declined",
            Rejection::WalletTimeout => "wallet_timeout",
        }
    }

    /// Malformed input, as opposed to a failed proof.
    ///
    /// Only raised before the nonce is looked up, so the answer never
    /// depends on nonce state.
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, Rejection::InvalidIdentity | Rejection::FormatError)
    }

    /// Coarse reason safe to show an unauthenticated caller.
    pub fn public_reason(&self) -> &'static str {
        match self {
            Rejection::InvalidIdentity | Rejection::FormatError => "invalid_request",
            Rejection::WalletDeclined | Rejection::WalletTimeout => "wallet_unavailable",
            _ => "authentication_failed",
        }
    }
}

impl From<FormatError> for Rejection {
    fn from(_: FormatError) -> Self {
        Rejection::FormatError
    }
}

/// Outcome of an auth operation that did not authenticate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in rejected: {0}")]
    Rejected(Rejection),

    /// Storage is unavailable; the caller decides whether to retry.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),

    /// The configured message fields cannot be rendered.
    #[error("cannot build sign-in message: {0}")]
    Message(FormatError),
}

impl From<Rejection> for AuthError {
    fn from(rejection: Rejection) -> Self {
        AuthError::Rejected(rejection)
    }
}

impl From<NonceError> for AuthError {
    fn from(err: NonceError) -> Self {
        match err {
            NonceError::NotFound => AuthError::Rejected(Rejection::NonceNotFound),
            NonceError::Expired => AuthError::Rejected(Rejection::NonceExpired),
            // A spent nonce is no longer active, so it cannot match
            NonceError::Mismatch | NonceError::AlreadyConsumed => {
                AuthError::Rejected(Rejection::NonceMismatch)
            }
            NonceError::Storage(e) => AuthError::Storage(e),
        }
    }
}
