//! Account identities (Ed25519 public keys).

use crate::auth::encoding::{Base58, TextEncoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Longest base58 text a 32-byte key encodes to.
const MAX_TEXT_LEN: usize = 44;

/// A 32-byte public key whose canonical text form is base58.
///
/// Parsing only checks the encoding and length; whether the bytes are a
/// valid curve point is left to signature verification.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity([u8; PUBLIC_KEY_LEN]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identity: {0}")]
pub struct InvalidIdentity(pub String);

impl Identity {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Identity(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Parse the canonical base58 text form.
    pub fn parse(text: &str) -> Result<Self, InvalidIdentity> {
        if text.is_empty() {
            return Err(InvalidIdentity("empty".to_string()));
        }
        // Base58 decoding is quadratic in the input length
        if text.len() > MAX_TEXT_LEN {
            return Err(InvalidIdentity(format!(
                "expected at most {} characters, got {}",
                MAX_TEXT_LEN,
                text.len()
            )));
        }
        let bytes = Base58
            .decode(text)
            .map_err(|e| InvalidIdentity(e.to_string()))?;
        let array: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            InvalidIdentity(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Identity(array))
    }

    pub fn to_base58(&self) -> String {
        Base58.encode(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_base58())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Identity::parse(&text).map_err(serde::de::Error::custom)
    }
}
