//! Sign-in state machine.
//!
//! `Start → NonceIssued → Verifying → {Authenticated | Rejected}`
//!
//! [`AuthSession`] is the only component that talks to the user directory
//! (through [`NonceStore`]) and to wallets. A verification attempt spends
//! the nonce before any proof is checked, so a failed or repeated attempt
//! always needs a fresh challenge.

use crate::auth::encoding::{Base64, TextEncoding};
use crate::auth::error::{AuthError, Rejection};
use crate::auth::identity::Identity;
use crate::auth::message::SignInMessage;
use crate::auth::nonce::NonceStore;
use crate::auth::verify::verify_signature;
use crate::config::SignInConfig;
use crate::models::NonceRecord;
use crate::wallet::{SignedAssertion, Wallet, WalletError, WalletSignInRequest};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A nonce plus everything needed to present and sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub identity: Identity,
    pub nonce: String,
    pub domain: String,
    pub statement: String,
    pub uri: String,
    pub chain_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Canonical message text the wallet signs.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Start,
    NonceIssued(Challenge),
    Verifying,
    Authenticated(Identity),
    Rejected(Rejection),
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::Start => "start",
            AuthState::NonceIssued(_) => "nonce_issued",
            AuthState::Verifying => "verifying",
            AuthState::Authenticated(_) => "authenticated",
            AuthState::Rejected(_) => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Authenticated(_) | AuthState::Rejected(_))
    }

    fn permits(&self, next: &AuthState) -> bool {
        matches!(
            (self, next),
            (AuthState::Start, AuthState::NonceIssued(_))
                | (AuthState::Start, AuthState::Rejected(_))
                | (AuthState::NonceIssued(_), AuthState::Verifying)
                | (AuthState::NonceIssued(_), AuthState::Rejected(_))
                | (AuthState::Verifying, AuthState::Authenticated(_))
                | (AuthState::Verifying, AuthState::Rejected(_))
        )
    }
}

/// One pass through the state machine, with the states it went through.
#[derive(Debug)]
pub struct AuthAttempt {
    state: AuthState,
    trail: Vec<&'static str>,
}

impl AuthAttempt {
    fn new() -> Self {
        AuthAttempt {
            state: AuthState::Start,
            trail: vec![AuthState::Start.name()],
        }
    }

    fn advance(&mut self, next: AuthState) {
        debug_assert!(
            self.state.permits(&next),
            "illegal transition {} -> {}",
            self.state.name(),
            next.name()
        );
        tracing::debug!(from = self.state.name(), to = next.name(), "Sign-in state change");
        self.trail.push(next.name());
        self.state = next;
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn trail(&self) -> &[&'static str] {
        &self.trail
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            AuthState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self.state {
            AuthState::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

pub struct AuthSession {
    nonces: NonceStore,
    config: SignInConfig,
    wire: Arc<dyn TextEncoding>,
}

impl AuthSession {
    /// Byte fields cross the wallet boundary as base64.
    pub fn new(nonces: NonceStore, config: SignInConfig) -> Self {
        Self::with_wire_encoding(nonces, config, Arc::new(Base64))
    }

    pub fn with_wire_encoding(
        nonces: NonceStore,
        config: SignInConfig,
        wire: Arc<dyn TextEncoding>,
    ) -> Self {
        AuthSession {
            nonces,
            config,
            wire,
        }
    }

    pub fn wire_encoding(&self) -> &dyn TextEncoding {
        self.wire.as_ref()
    }

    /// The message the holder must have signed for `record`.
    fn expected_message(&self, record: &NonceRecord) -> SignInMessage {
        SignInMessage {
            domain: self.config.domain.clone(),
            address: record.identity,
            statement: self.config.statement.clone(),
            uri: self.config.uri.clone(),
            chain_id: self.config.chain_id.clone(),
            nonce: record.value.clone(),
            issued_at: record.issued_at,
            expiration_time: Some(record.expires_at),
        }
    }

    /// `Start → NonceIssued`: issue a nonce and build the challenge.
    pub async fn request(&self, identity: &str) -> Result<Challenge, AuthError> {
        let identity = Identity::parse(identity).map_err(|e| {
            tracing::debug!(error = %e, "Challenge requested for malformed identity");
            Rejection::InvalidIdentity
        })?;

        let record = self.nonces.issue(&identity).await?;
        let message = self
            .expected_message(&record)
            .to_text()
            .map_err(AuthError::Message)?;

        Ok(Challenge {
            identity,
            nonce: record.value,
            domain: self.config.domain.clone(),
            statement: self.config.statement.clone(),
            uri: self.config.uri.clone(),
            chain_id: self.config.chain_id.clone(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            message,
        })
    }

    /// `NonceIssued → Verifying → {Authenticated | Rejected}` for a wallet
    /// response that reached the service.
    pub async fn submit(
        &self,
        identity: &str,
        assertion: &SignedAssertion,
    ) -> Result<Identity, AuthError> {
        let result = self.verify_assertion(identity, assertion).await;
        match &result {
            Ok(identity) => {
                tracing::info!(action = "auth_success", identity = %identity, "Sign-in verified");
            }
            Err(AuthError::Rejected(rejection)) => {
                tracing::warn!(action = "auth_failed", identity = %identity, reason = rejection.as_str(), "Sign-in rejected");
            }
            Err(e) => {
                tracing::error!(action = "auth_error", identity = %identity, error = %e, "Sign-in could not be verified");
            }
        }
        result
    }

    async fn verify_assertion(
        &self,
        identity: &str,
        assertion: &SignedAssertion,
    ) -> Result<Identity, AuthError> {
        let identity = Identity::parse(identity).map_err(|_| Rejection::InvalidIdentity)?;

        // Only used to learn which nonce the client claims
        let claimed = SignInMessage::decode(&assertion.signed_message).map_err(|e| {
            tracing::debug!(error = %e, "Signed message does not parse");
            Rejection::FormatError
        })?;

        // Spent from here on, whatever the outcome
        let record = self.nonces.consume(&identity, &claimed.nonce).await?;

        if assertion.address != identity {
            return Err(Rejection::AddressMismatch.into());
        }

        let expected = self
            .expected_message(&record)
            .encode()
            .map_err(AuthError::Message)?;

        if expected != assertion.signed_message {
            tracing::debug!(
                expected = %String::from_utf8_lossy(&expected),
                signed = %String::from_utf8_lossy(&assertion.signed_message),
                "Signed message differs from the issued challenge"
            );
            return Err(Rejection::MessageMismatch.into());
        }

        if !verify_signature(&assertion.address, &expected, &assertion.signature) {
            return Err(Rejection::SignatureInvalid.into());
        }

        Ok(identity)
    }

    /// Drive a whole attempt: request a challenge, ask `wallet` to sign it
    /// within the configured timeout, then verify.
    ///
    /// Rejections end up in the returned attempt; only storage and
    /// configuration faults are returned as errors.
    pub async fn sign_in(
        &self,
        identity: &str,
        wallet: &dyn Wallet,
    ) -> Result<AuthAttempt, AuthError> {
        let mut attempt = AuthAttempt::new();

        let challenge = match self.request(identity).await {
            Ok(challenge) => challenge,
            Err(AuthError::Rejected(rejection)) => {
                attempt.advance(AuthState::Rejected(rejection));
                return Ok(attempt);
            }
            Err(e) => return Err(e),
        };
        attempt.advance(AuthState::NonceIssued(challenge.clone()));

        let request = WalletSignInRequest {
            chain: self.config.chain_id.clone(),
            app_identity: self.config.app_identity.clone(),
            challenge,
        };

        let signed = tokio::time::timeout(self.config.wallet_timeout, wallet.sign_in(&request)).await;
        let output = match signed {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let rejection = match e {
                    WalletError::Timeout => Rejection::WalletTimeout,
                    WalletError::Declined | WalletError::Unavailable(_) => Rejection::WalletDeclined,
                };
                tracing::warn!(action = "wallet_failed", identity = %identity, error = %e, "Wallet did not sign");
                attempt.advance(AuthState::Rejected(rejection));
                return Ok(attempt);
            }
            Err(_) => {
                tracing::warn!(action = "wallet_timeout", identity = %identity, timeout_secs = self.config.wallet_timeout.as_secs(), "Wallet did not respond in time");
                attempt.advance(AuthState::Rejected(Rejection::WalletTimeout));
                return Ok(attempt);
            }
        };
        attempt.advance(AuthState::Verifying);

        let outcome = match SignedAssertion::from_wire(&output, self.wire.as_ref()) {
            Ok(assertion) => self.submit(identity, &assertion).await,
            Err(e) => {
                tracing::warn!(action = "auth_failed", identity = %identity, error = %e, "Malformed wallet response");
                Err(Rejection::FormatError.into())
            }
        };

        match outcome {
            Ok(identity) => attempt.advance(AuthState::Authenticated(identity)),
            Err(AuthError::Rejected(rejection)) => attempt.advance(AuthState::Rejected(rejection)),
            Err(e) => return Err(e),
        }
        Ok(attempt)
    }
}
