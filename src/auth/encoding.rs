//! Binary-to-text encodings used at the service boundary.
//!
//! Addresses and nonces travel as base58; signatures and signed message
//! bytes travel as base64. Callers pass the encoding they need explicitly.

use crate::auth::message::FormatError;
use base64::{engine::general_purpose, Engine as _};

/// A fixed binary-to-text encoding.
pub trait TextEncoding: Send + Sync {
    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    fn encode(&self, bytes: &[u8]) -> String;

    fn decode(&self, text: &str) -> Result<Vec<u8>, FormatError>;
}

/// Standard base64 with padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64;

impl TextEncoding for Base64 {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn encode(&self, bytes: &[u8]) -> String {
        general_purpose::STANDARD.encode(bytes)
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, FormatError> {
        general_purpose::STANDARD
            .decode(text)
            .map_err(|e| FormatError::Encoding(format!("invalid {}: {}", self.name(), e)))
    }
}

/// Base58 (Bitcoin alphabet), the Solana address encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base58;

impl TextEncoding for Base58 {
    fn name(&self) -> &'static str {
        "base58"
    }

    fn encode(&self, bytes: &[u8]) -> String {
        bs58::encode(bytes).into_string()
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, FormatError> {
        bs58::decode(text)
            .into_vec()
            .map_err(|e| FormatError::Encoding(format!("invalid {}: {}", self.name(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_rejects_garbage() {
        let result = Base64.decode("not base64!!");
        assert!(matches!(result, Err(FormatError::Encoding(_))));
    }

    #[test]
    fn test_base58_rejects_excluded_characters() {
        // '0', 'O', 'I' and 'l' are not in the base58 alphabet
        match Base58.decode("0OIl") {
            Err(FormatError::Encoding(msg)) => assert!(msg.starts_with("invalid base58")),
            other => panic!("Expected encoding error, got {:?}", other),
        }
    }

    #[test]
    fn test_encodings_are_distinct() {
        let bytes = [0xffu8, 0x00, 0x10, 0x20];
        assert_ne!(Base64.encode(&bytes), Base58.encode(&bytes));
        assert_eq!(Base58.decode(&Base58.encode(&bytes)).unwrap(), bytes);
    }
}
