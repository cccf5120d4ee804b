//! Nonce issuance and single-use consumption.

use crate::auth::encoding::{Base58, TextEncoding};
use crate::auth::identity::Identity;
use crate::models::NonceRecord;
use crate::storage::{ConsumeOutcome, StorageError, UserDirectory};
use chrono::{SubsecRound, TimeDelta, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Random bytes behind each nonce.
pub const NONCE_BYTES: usize = 32;

/// Longest nonce lifetime. Longer lifetimes are clamped to it.
pub const MAX_NONCE_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, thiserror::Error)]
pub enum NonceError {
    #[error("no nonce issued for this identity")]
    NotFound,

    #[error("nonce expired")]
    Expired,

    #[error("nonce does not match the active nonce")]
    Mismatch,

    #[error("nonce already consumed")]
    AlreadyConsumed,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Generate a cryptographically random challenge nonce.
///
/// Returns base58 text (43 or 44 characters) from 32 random bytes.
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; NONCE_BYTES];
    rng.fill(&mut bytes);
    Base58.encode(&bytes)
}

/// Issues nonces with a fixed lifetime and consumes them at most once.
#[derive(Clone)]
pub struct NonceStore {
    directory: Arc<dyn UserDirectory>,
    ttl: TimeDelta,
}

impl NonceStore {
    pub fn new(directory: Arc<dyn UserDirectory>, ttl: Duration) -> Self {
        let ttl = ttl.min(MAX_NONCE_TTL);
        NonceStore {
            directory,
            ttl: TimeDelta::milliseconds(ttl.as_millis() as i64),
        }
    }

    /// Issue a fresh nonce for `identity`, superseding any previous one.
    ///
    /// Timestamps are truncated to milliseconds so they render losslessly
    /// in the sign-in message.
    pub async fn issue(&self, identity: &Identity) -> Result<NonceRecord, StorageError> {
        let issued_at = Utc::now().trunc_subsecs(3);
        let expires_at = issued_at + self.ttl;

        let record = NonceRecord {
            identity: *identity,
            value: generate_nonce(),
            issued_at,
            expires_at,
            consumed: false,
        };
        self.directory.put_nonce(&record).await?;

        tracing::debug!(action = "nonce_issued", identity = %identity, expires_at = %expires_at, "Nonce issued");
        Ok(record)
    }

    /// Atomically invalidate the active nonce if it equals `value`.
    ///
    /// Returns the consumed record. A record found expired at this point
    /// stays consumed and yields `Expired`.
    pub async fn consume(
        &self,
        identity: &Identity,
        value: &str,
    ) -> Result<NonceRecord, NonceError> {
        let record = match self.directory.mark_nonce_consumed(identity, value).await? {
            ConsumeOutcome::Consumed(record) => record,
            ConsumeOutcome::AlreadyConsumed => return Err(NonceError::AlreadyConsumed),
            ConsumeOutcome::Mismatch => return Err(NonceError::Mismatch),
            ConsumeOutcome::NotFound => return Err(NonceError::NotFound),
        };

        if record.is_expired_at(Utc::now()) {
            return Err(NonceError::Expired);
        }
        Ok(record)
    }

    /// The identity's current record, consumed or not.
    pub async fn current(&self, identity: &Identity) -> Result<Option<NonceRecord>, StorageError> {
        self.directory.load_nonce(identity).await
    }

    /// Remove expired records. `consume` checks expiry on its own, so this
    /// only bounds storage growth.
    pub async fn sweep_expired(&self) -> Result<usize, StorageError> {
        self.directory.sweep_nonces(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDirectory;

    fn store(ttl: Duration) -> NonceStore {
        NonceStore::new(Arc::new(MemoryDirectory::new()), ttl)
    }

    fn identity(id: u8) -> Identity {
        Identity::from_bytes([id; 32])
    }

    #[test]
    fn test_generate_nonce() {
        let nonce = generate_nonce();

        let decoded = Base58.decode(&nonce).unwrap();
        assert_eq!(decoded.len(), NONCE_BYTES);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_nonces_are_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[tokio::test]
    async fn test_issue_sets_lifetime() {
        let store = store(Duration::from_secs(300));
        let record = store.issue(&identity(1)).await.unwrap();

        assert_eq!(record.expires_at - record.issued_at, TimeDelta::seconds(300));
        assert!(!record.consumed);
        assert_eq!(record.issued_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[tokio::test]
    async fn test_oversized_lifetime_is_clamped() {
        let store = store(Duration::from_secs(u64::MAX));
        let record = store.issue(&identity(8)).await.unwrap();

        assert_eq!(record.expires_at - record.issued_at, TimeDelta::seconds(86_400));
        assert!(store.consume(&identity(8), &record.value).await.is_ok());
    }

    #[tokio::test]
    async fn test_issue_then_consume_exactly_once() {
        let store = store(Duration::from_secs(300));
        let id = identity(2);
        let record = store.issue(&id).await.unwrap();

        let consumed = store.consume(&id, &record.value).await.unwrap();
        assert!(consumed.consumed);

        let second = store.consume(&id, &record.value).await;
        assert!(matches!(second, Err(NonceError::AlreadyConsumed)));
    }

    #[tokio::test]
    async fn test_reissue_supersedes_previous_nonce() {
        let store = store(Duration::from_secs(300));
        let id = identity(3);
        let first = store.issue(&id).await.unwrap();
        let second = store.issue(&id).await.unwrap();

        assert!(matches!(
            store.consume(&id, &first.value).await,
            Err(NonceError::Mismatch)
        ));
        assert!(store.consume(&id, &second.value).await.is_ok());
    }

    #[tokio::test]
    async fn test_consume_unknown_identity() {
        let store = store(Duration::from_secs(300));
        assert!(matches!(
            store.consume(&identity(4), "anything").await,
            Err(NonceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_consume_expired() {
        let store = store(Duration::ZERO);
        let id = identity(5);
        let record = store.issue(&id).await.unwrap();

        assert!(matches!(
            store.consume(&id, &record.value).await,
            Err(NonceError::Expired)
        ));
        // Expiry is terminal
        assert!(matches!(
            store.consume(&id, &record.value).await,
            Err(NonceError::AlreadyConsumed)
        ));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = store(Duration::ZERO);
        let id = identity(6);
        store.issue(&id).await.unwrap();

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert!(store.current(&id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_issue_leaves_one_active_nonce() {
        let store = store(Duration::from_secs(300));
        let id = identity(7);

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.issue(&id).await.unwrap() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.issue(&id).await.unwrap() }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let active = store.current(&id).await.unwrap().unwrap();
        let superseded = if active.value == a.value { b } else { a };

        assert!(matches!(
            store.consume(&id, &superseded.value).await,
            Err(NonceError::Mismatch)
        ));
        assert!(store.consume(&id, &active.value).await.is_ok());
    }
}
