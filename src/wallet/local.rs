//! Software wallet holding an Ed25519 key in process.

use super::{Wallet, WalletError, WalletSignInOutput, WalletSignInRequest};
use crate::auth::encoding::{Base64, TextEncoding};
use crate::auth::identity::Identity;
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroizing;

/// Argon2id cost parameters (OWASP recommendation): 19 MiB, 2 passes, 1 lane.
const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// Minimum Argon2 salt length in bytes.
const MIN_SALT_LEN: usize = 8;

pub struct LocalWallet {
    signing_key: SigningKey,
}

impl LocalWallet {
    /// A wallet with a fresh random key.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rand::fill(&mut *seed);
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        LocalWallet {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Derive the key from a passphrase with Argon2id.
    ///
    /// Salts shorter than 8 bytes are padded with NUL bytes.
    pub fn from_passphrase(passphrase: &str, salt: &str) -> Result<Self, WalletError> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let mut salt_bytes = salt.as_bytes().to_vec();
        if salt_bytes.len() < MIN_SALT_LEN {
            salt_bytes.resize(MIN_SALT_LEN, 0);
        }

        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(32),
        )
        .map_err(|e| WalletError::Unavailable(format!("Argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut seed = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(passphrase.as_bytes(), &salt_bytes, &mut *seed)
            .map_err(|e| WalletError::Unavailable(format!("Argon2 hash: {}", e)))?;

        Ok(Self::from_seed(&seed))
    }

    pub fn identity(&self) -> Identity {
        Identity::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    /// Signs the challenge's canonical text exactly as delivered.
    async fn sign_in(
        &self,
        request: &WalletSignInRequest,
    ) -> Result<WalletSignInOutput, WalletError> {
        let message = request.challenge.message.as_bytes();
        Ok(WalletSignInOutput {
            address: self.identity().to_base58(),
            signature: Base64.encode(&self.sign(message)),
            signed_message: Base64.encode(message),
        })
    }
}
