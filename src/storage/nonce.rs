//! Redis-backed nonce records.
//!
//! Redis key pattern:
//! - `nonce:{address}` — the identity's current nonce record (JSON)
//!
//! Records outlive their expiry by `EXPIRED_RETENTION_SECS` so a late
//! verification is reported as expired rather than missing. The periodic
//! sweep removes them earlier.
//!
//! ## Security: Zeroizing Sensitive Data
//!
//! Record JSON read back from Redis contains a live nonce and is wrapped in
//! `Zeroizing` so the raw string is cleared once parsed.

use super::{scan_keys, ConsumeOutcome, StorageError, UserDirectory};
use crate::auth::identity::Identity;
use crate::models::NonceRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use zeroize::Zeroizing;

/// How long a record is kept in Redis after it expires.
pub const EXPIRED_RETENTION_SECS: u64 = 300;

/// Atomic compare-and-set on the consumed flag.
const CONSUME_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return {'not_found'}
end
local record = cjson.decode(raw)
if record['value'] ~= ARGV[1] then
    return {'mismatch'}
end
if record['consumed'] then
    return {'consumed'}
end
record['consumed'] = true
local updated = cjson.encode(record)
redis.call('SET', KEYS[1], updated, 'KEEPTTL')
return {'ok', updated}
";

/// Delete a key only if it still holds the value the sweep inspected.
const DELETE_IF_UNCHANGED_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('DEL', KEYS[1])
    return 1
end
return 0
";

fn nonce_key(identity: &Identity) -> String {
    format!("nonce:{}", identity)
}

fn parse_record(json: &str) -> Result<NonceRecord, StorageError> {
    serde_json::from_str(json).map_err(|e| StorageError::Corrupt(format!("nonce record: {}", e)))
}

/// Store a nonce record, superseding any previous one for the identity.
pub async fn store_nonce<C>(
    con: &mut C,
    record: &NonceRecord,
    ttl_secs: u64,
) -> Result<(), StorageError>
where
    C: AsyncCommands,
{
    let json = serde_json::to_string(record)
        .map_err(|e| StorageError::Corrupt(format!("JSON serialize: {}", e)))?;

    con.set_ex::<_, _, ()>(nonce_key(&record.identity), json, ttl_secs)
        .await?;
    Ok(())
}

/// Get the current nonce record for an identity.
pub async fn get_nonce<C>(
    con: &mut C,
    identity: &Identity,
) -> Result<Option<NonceRecord>, StorageError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(nonce_key(identity)).await?;

    match json {
        Some(data) => {
            let zeroizing_data = Zeroizing::new(data);
            Ok(Some(parse_record(&zeroizing_data)?))
        }
        None => Ok(None),
    }
}

/// Mark the identity's nonce consumed if it holds exactly `value`.
///
/// Uses a Lua script so the check and the update cannot interleave with
/// another caller.
pub async fn mark_consumed<C>(
    con: &mut C,
    identity: &Identity,
    value: &str,
) -> Result<ConsumeOutcome, StorageError>
where
    C: AsyncCommands,
{
    let script = redis::Script::new(CONSUME_SCRIPT);
    let reply: Vec<String> = script
        .key(nonce_key(identity))
        .arg(value)
        .invoke_async(con)
        .await?;

    match reply.as_slice() {
        [status] if status == "not_found" => Ok(ConsumeOutcome::NotFound),
        [status] if status == "mismatch" => Ok(ConsumeOutcome::Mismatch),
        [status] if status == "consumed" => Ok(ConsumeOutcome::AlreadyConsumed),
        [status, json] if status == "ok" => {
            let zeroizing_data = Zeroizing::new(json.clone());
            Ok(ConsumeOutcome::Consumed(parse_record(&zeroizing_data)?))
        }
        other => Err(StorageError::Corrupt(format!(
            "unexpected consume reply with {} elements",
            other.len()
        ))),
    }
}

/// Delete every record that expired at or before `now`.
pub async fn sweep_expired<C>(con: &mut C, now: DateTime<Utc>) -> Result<usize, StorageError>
where
    C: AsyncCommands,
{
    let script = redis::Script::new(DELETE_IF_UNCHANGED_SCRIPT);
    let mut removed = 0;

    for key in scan_keys(con, "nonce:*").await? {
        let json: Option<String> = con.get(&key).await?;
        let Some(data) = json else { continue };
        let data = Zeroizing::new(data);

        let expired = match parse_record(&data) {
            Ok(record) => record.is_expired_at(now),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Removing unreadable nonce record");
                true
            }
        };
        if !expired {
            continue;
        }

        let deleted: i32 = script
            .key(&key)
            .arg(data.as_str())
            .invoke_async(con)
            .await?;
        removed += deleted as usize;
    }

    Ok(removed)
}

/// [`UserDirectory`] over a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisDirectory {
    con: MultiplexedConnection,
}

impl RedisDirectory {
    /// Open a client and verify the connection.
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let con = client.get_multiplexed_async_connection().await?;
        Ok(RedisDirectory { con })
    }
}

#[async_trait]
impl UserDirectory for RedisDirectory {
    async fn put_nonce(&self, record: &NonceRecord) -> Result<(), StorageError> {
        let remaining = (record.expires_at - Utc::now()).num_seconds().max(0) as u64;
        let mut con = self.con.clone();
        store_nonce(&mut con, record, remaining + EXPIRED_RETENTION_SECS).await
    }

    async fn load_nonce(&self, identity: &Identity) -> Result<Option<NonceRecord>, StorageError> {
        let mut con = self.con.clone();
        get_nonce(&mut con, identity).await
    }

    async fn mark_nonce_consumed(
        &self,
        identity: &Identity,
        value: &str,
    ) -> Result<ConsumeOutcome, StorageError> {
        let mut con = self.con.clone();
        mark_consumed(&mut con, identity, value).await
    }

    async fn sweep_nonces(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut con = self.con.clone();
        sweep_expired(&mut con, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    async fn test_directory() -> Option<RedisDirectory> {
        // Note: These tests require a running Redis instance
        // Skip if Redis is not reachable
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        match RedisDirectory::connect(&redis_url).await {
            Ok(directory) => Some(directory),
            Err(_) => {
                eprintln!("Skipping test: Redis not available");
                None
            }
        }
    }

    fn random_identity() -> Identity {
        let mut bytes = [0u8; 32];
        rand::fill(&mut bytes);
        Identity::from_bytes(bytes)
    }

    fn record(identity: Identity, value: &str, ttl: TimeDelta) -> NonceRecord {
        let now = Utc::now();
        NonceRecord {
            identity,
            value: value.to_string(),
            issued_at: now,
            expires_at: now + ttl,
            consumed: false,
        }
    }

    #[tokio::test]
    async fn test_redis_consume_once() {
        let Some(directory) = test_directory().await else {
            return;
        };
        let identity = random_identity();
        directory
            .put_nonce(&record(identity, "n1", TimeDelta::minutes(5)))
            .await
            .unwrap();

        assert_eq!(
            directory.mark_nonce_consumed(&identity, "other").await.unwrap(),
            ConsumeOutcome::Mismatch
        );

        match directory.mark_nonce_consumed(&identity, "n1").await.unwrap() {
            ConsumeOutcome::Consumed(r) => {
                assert!(r.consumed);
                assert_eq!(r.identity, identity);
            }
            other => panic!("Expected Consumed, got {:?}", other),
        }

        assert_eq!(
            directory.mark_nonce_consumed(&identity, "n1").await.unwrap(),
            ConsumeOutcome::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_redis_sweep_removes_expired_only() {
        let Some(directory) = test_directory().await else {
            return;
        };
        let expired = random_identity();
        let live = random_identity();
        directory
            .put_nonce(&record(expired, "old", TimeDelta::zero()))
            .await
            .unwrap();
        directory
            .put_nonce(&record(live, "new", TimeDelta::minutes(5)))
            .await
            .unwrap();

        let removed = directory
            .sweep_nonces(Utc::now() + TimeDelta::seconds(1))
            .await
            .unwrap();
        assert!(removed >= 1);
        assert!(directory.load_nonce(&expired).await.unwrap().is_none());
        assert!(directory.load_nonce(&live).await.unwrap().is_some());

        assert_eq!(
            directory.mark_nonce_consumed(&expired, "old").await.unwrap(),
            ConsumeOutcome::NotFound
        );
    }
}
