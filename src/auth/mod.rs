//! Wallet sign-in: nonce issuance, message codec, Ed25519 verification and
//! the session state machine tying them together.

pub mod encoding;
pub mod error;
pub mod identity;
pub mod message;
pub mod nonce;
pub mod session;
pub mod verify;

pub use error::{AuthError, Rejection};
pub use identity::Identity;
pub use message::{FormatError, SignInMessage};
pub use nonce::{NonceError, NonceStore};
pub use session::{AuthAttempt, AuthSession, AuthState, Challenge};
pub use verify::verify_signature;
