//! In-process user directory.
//!
//! Each identity's record lives in one `DashMap` entry; holding the entry
//! guard serializes compare-and-set per identity.

use super::{ConsumeOutcome, StorageError, UserDirectory};
use crate::auth::identity::Identity;
use crate::models::NonceRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryDirectory {
    records: DashMap<Identity, NonceRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn put_nonce(&self, record: &NonceRecord) -> Result<(), StorageError> {
        self.records.insert(record.identity, record.clone());
        Ok(())
    }

    async fn load_nonce(&self, identity: &Identity) -> Result<Option<NonceRecord>, StorageError> {
        Ok(self.records.get(identity).map(|r| r.value().clone()))
    }

    async fn mark_nonce_consumed(
        &self,
        identity: &Identity,
        value: &str,
    ) -> Result<ConsumeOutcome, StorageError> {
        let Some(mut record) = self.records.get_mut(identity) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if record.value != value {
            return Ok(ConsumeOutcome::Mismatch);
        }
        if record.consumed {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        record.consumed = true;
        Ok(ConsumeOutcome::Consumed(record.value().clone()))
    }

    async fn sweep_nonces(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
