//! User directory: persistence for per-identity nonce records.
//!
//! Two backends implement [`UserDirectory`]: Redis ([`nonce`]) and an
//! in-process map ([`memory`]). Both keep at most one record per identity.

pub mod memory;
pub mod nonce;

use crate::auth::identity::Identity;
use crate::models::NonceRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;

pub use memory::MemoryDirectory;
pub use nonce::RedisDirectory;

/// Maximum number of keys returned by scan_keys to prevent unbounded memory allocation.
const SCAN_MAX_KEYS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result of an atomic check-and-invalidate on a nonce record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The record matched and was unconsumed; it is now consumed.
    Consumed(NonceRecord),
    /// The record matched but had already been consumed.
    AlreadyConsumed,
    /// A record exists for the identity with a different value.
    Mismatch,
    NotFound,
}

/// Nonce persistence keyed by identity.
///
/// `mark_nonce_consumed` must be atomic per identity: of any number of
/// concurrent calls with the same value, at most one sees `Consumed`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Store `record`, replacing any previous record for its identity.
    async fn put_nonce(&self, record: &NonceRecord) -> Result<(), StorageError>;

    async fn load_nonce(&self, identity: &Identity) -> Result<Option<NonceRecord>, StorageError>;

    async fn mark_nonce_consumed(
        &self,
        identity: &Identity,
        value: &str,
    ) -> Result<ConsumeOutcome, StorageError>;

    /// Remove records with `expires_at <= now`. Returns how many were removed.
    async fn sweep_nonces(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;
}

/// Scan for Redis keys matching a pattern using SCAN (non-blocking).
///
/// Unlike KEYS, SCAN does not block the Redis server during iteration.
/// Capped at SCAN_MAX_KEYS results to prevent unbounded memory growth.
pub async fn scan_keys<C>(con: &mut C, pattern: &str) -> Result<Vec<String>, redis::RedisError>
where
    C: AsyncCommands,
{
    let mut all_keys = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(100)
            .query_async(con)
            .await?;
        all_keys.extend(keys);
        if all_keys.len() >= SCAN_MAX_KEYS {
            all_keys.truncate(SCAN_MAX_KEYS);
            break;
        }
        cursor = new_cursor;
        if cursor == 0 {
            break;
        }
    }
    Ok(all_keys)
}
