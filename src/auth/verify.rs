//! Ed25519 signature verification.

use crate::auth::identity::Identity;
use ed25519_dalek::{Signature, VerifyingKey};

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Verify an Ed25519 signature over `message` under `address`.
///
/// Total over its inputs: a wrong signature length, a public key that is not
/// a valid curve point, or a weak (small-order) key all return `false`.
/// Uses strict verification, which also rejects non-canonical signatures.
pub fn verify_signature(address: &Identity, message: &[u8], signature: &[u8]) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(address.as_bytes()) {
        Ok(key) => key,
        Err(_) => return false,
    };

    let signature_array: [u8; SIGNATURE_LEN] = match signature.try_into() {
        Ok(array) => array,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&signature_array);

    verifying_key.verify_strict(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn generate_test_signing_key() -> SigningKey {
        let mut seed = [0u8; 32];
        rand::fill(&mut seed);
        SigningKey::from_bytes(&seed)
    }

    fn identity_of(key: &SigningKey) -> Identity {
        Identity::from_bytes(key.verifying_key().to_bytes())
    }

    #[test]
    fn test_verify_signature_valid() {
        let signing_key = generate_test_signing_key();
        let message = b"test message";
        let signature = signing_key.sign(message);

        assert!(verify_signature(
            &identity_of(&signing_key),
            message,
            &signature.to_bytes()
        ));
    }

    #[test]
    fn test_verify_signature_wrong_message() {
        let signing_key = generate_test_signing_key();
        let signature = signing_key.sign(b"test message");

        assert!(!verify_signature(
            &identity_of(&signing_key),
            b"wrong message",
            &signature.to_bytes()
        ));
    }

    #[test]
    fn test_verify_signature_other_key() {
        let signer = generate_test_signing_key();
        let other = generate_test_signing_key();
        let message = b"test message";
        let signature = signer.sign(message);

        assert!(!verify_signature(
            &identity_of(&other),
            message,
            &signature.to_bytes()
        ));
    }

    #[test]
    fn test_single_bit_flips_fail() {
        let signing_key = generate_test_signing_key();
        let identity = identity_of(&signing_key);
        let message = b"bits.app wants you to sign in".to_vec();
        let signature = signing_key.sign(&message).to_bytes();

        for i in 0..message.len() * 8 {
            let mut flipped = message.clone();
            flipped[i / 8] ^= 1 << (i % 8);
            assert!(!verify_signature(&identity, &flipped, &signature));
        }

        for i in 0..SIGNATURE_LEN * 8 {
            let mut flipped = signature;
            flipped[i / 8] ^= 1 << (i % 8);
            assert!(!verify_signature(&identity, &message, &flipped));
        }
    }

    #[test]
    fn test_verify_signature_invalid_signature_length() {
        let signing_key = generate_test_signing_key();
        let identity = identity_of(&signing_key);

        assert!(!verify_signature(&identity, b"test", b"too_short"));
        assert!(!verify_signature(&identity, b"test", &[0u8; 65]));
        assert!(!verify_signature(&identity, b"test", &[]));
    }

    #[test]
    fn test_verify_signature_weak_key() {
        // The identity point (small order) must never verify
        let mut weak = [0u8; 32];
        weak[0] = 1;
        assert!(!verify_signature(
            &Identity::from_bytes(weak),
            b"test",
            &[0u8; SIGNATURE_LEN]
        ));
    }

    #[test]
    fn test_verify_signature_all_zero_inputs() {
        assert!(!verify_signature(
            &Identity::from_bytes([0u8; 32]),
            b"",
            &[0u8; SIGNATURE_LEN]
        ));
    }

    #[test]
    fn test_verify_signature_concurrent() {
        let signing_key = generate_test_signing_key();
        let identity = identity_of(&signing_key);
        let message = b"shared".to_vec();
        let signature = signing_key.sign(&message).to_bytes();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let message = message.clone();
                std::thread::spawn(move || verify_signature(&identity, &message, &signature))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
