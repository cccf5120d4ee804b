//! Wallet collaborator interface.
//!
//! A wallet is asked to sign the challenge's canonical message with the
//! holder's key. The holder approves out of process, so the call may take a
//! human-scale time or never return; callers bound it with a timeout.

pub mod local;

use crate::auth::encoding::TextEncoding;
use crate::auth::identity::Identity;
use crate::auth::message::FormatError;
use crate::auth::session::Challenge;
use crate::auth::verify::SIGNATURE_LEN;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use local::LocalWallet;

/// How the requesting app presents itself in the wallet's approval prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub name: String,
    pub uri: String,
    pub icon: String,
}

/// Everything the wallet needs to show and sign the challenge.
#[derive(Debug, Clone)]
pub struct WalletSignInRequest {
    pub chain: String,
    pub app_identity: AppIdentity,
    pub challenge: Challenge,
}

/// Raw wallet response. Byte fields are base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSignInOutput {
    pub address: String,
    pub signature: String,
    pub signed_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("holder declined the sign-in request")]
    Declined,

    #[error("wallet did not respond in time")]
    Timeout,

    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// Signs sign-in challenges on behalf of a key holder.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn sign_in(
        &self,
        request: &WalletSignInRequest,
    ) -> Result<WalletSignInOutput, WalletError>;
}

/// A validated wallet response.
///
/// `signed_message` is what the wallet says it signed. It is only compared
/// against the message the service rebuilds; it never decides what is
/// verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAssertion {
    pub address: Identity,
    pub signature: [u8; SIGNATURE_LEN],
    pub signed_message: Vec<u8>,
}

impl SignedAssertion {
    /// Decode and validate a raw response in one step.
    pub fn from_wire(
        output: &WalletSignInOutput,
        encoding: &dyn TextEncoding,
    ) -> Result<Self, FormatError> {
        let address = Identity::parse(&output.address)
            .map_err(|e| FormatError::InvalidField("address", e.to_string()))?;

        let signature_bytes = encoding.decode(&output.signature)?;
        let signature: [u8; SIGNATURE_LEN] =
            signature_bytes
                .as_slice()
                .try_into()
                .map_err(|_| FormatError::InvalidLength {
                    field: "signature",
                    expected: SIGNATURE_LEN,
                    actual: signature_bytes.len(),
                })?;

        let signed_message = encoding.decode(&output.signed_message)?;
        if signed_message.is_empty() {
            return Err(FormatError::InvalidField(
                "signed message",
                "empty".to_string(),
            ));
        }

        Ok(SignedAssertion {
            address,
            signature,
            signed_message,
        })
    }

    pub fn to_wire(&self, encoding: &dyn TextEncoding) -> WalletSignInOutput {
        WalletSignInOutput {
            address: self.address.to_base58(),
            signature: encoding.encode(&self.signature),
            signed_message: encoding.encode(&self.signed_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::encoding::Base64;

    fn output(signature: &[u8], message: &[u8]) -> WalletSignInOutput {
        WalletSignInOutput {
            address: Identity::from_bytes([8u8; 32]).to_base58(),
            signature: Base64.encode(signature),
            signed_message: Base64.encode(message),
        }
    }

    #[test]
    fn test_from_wire_valid() {
        let assertion = SignedAssertion::from_wire(&output(&[1u8; 64], b"msg"), &Base64).unwrap();
        assert_eq!(assertion.address, Identity::from_bytes([8u8; 32]));
        assert_eq!(assertion.signature, [1u8; 64]);
        assert_eq!(assertion.signed_message, b"msg");
        assert_eq!(assertion.to_wire(&Base64), output(&[1u8; 64], b"msg"));
    }

    #[test]
    fn test_from_wire_short_signature() {
        let result = SignedAssertion::from_wire(&output(&[1u8; 63], b"msg"), &Base64);
        assert!(matches!(
            result,
            Err(FormatError::InvalidLength {
                field: "signature",
                expected: 64,
                actual: 63
            })
        ));
    }

    #[test]
    fn test_from_wire_bad_address() {
        let mut raw = output(&[1u8; 64], b"msg");
        raw.address = "not-an-address".to_string();
        assert!(matches!(
            SignedAssertion::from_wire(&raw, &Base64),
            Err(FormatError::InvalidField("address", _))
        ));
    }

    #[test]
    fn test_from_wire_bad_base64() {
        let mut raw = output(&[1u8; 64], b"msg");
        raw.signed_message = "%%%".to_string();
        assert!(matches!(
            SignedAssertion::from_wire(&raw, &Base64),
            Err(FormatError::Encoding(_))
        ));
    }

    #[test]
    fn test_from_wire_empty_message() {
        assert!(SignedAssertion::from_wire(&output(&[1u8; 64], b""), &Base64).is_err());
    }

    #[test]
    fn test_wallet_output_deserializes_from_json() {
        let json = serde_json::json!({
            "address": Identity::from_bytes([8u8; 32]).to_base58(),
            "signature": Base64.encode(&[2u8; 64]),
            "signed_message": Base64.encode(b"hello"),
        });
        let raw: WalletSignInOutput = serde_json::from_value(json).unwrap();
        assert!(SignedAssertion::from_wire(&raw, &Base64).is_ok());
    }
}
