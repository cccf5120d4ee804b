//! Background sweep of expired nonce records.
//!
//! Consumption checks expiry itself, so the sweep only keeps the directory
//! from growing with identities that never came back.

use crate::auth::nonce::NonceStore;
use std::time::Duration;

/// Run the sweep loop.
///
/// Removes expired nonce records every `interval`. Failures are logged and
/// retried on the next tick.
pub async fn run_sweep_loop(store: NonceStore, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        sweep_once(&store).await;
    }
}

async fn sweep_once(store: &NonceStore) -> usize {
    match store.sweep_expired().await {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(action = "nonce_sweep", removed = removed, "Expired nonces removed");
            removed
        }
        Err(e) => {
            tracing::error!(error = %e, "Nonce sweep failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::Identity;
    use crate::storage::MemoryDirectory;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_once_removes_expired() {
        let store = NonceStore::new(Arc::new(MemoryDirectory::new()), Duration::ZERO);
        store.issue(&Identity::from_bytes([1u8; 32])).await.unwrap();
        store.issue(&Identity::from_bytes([2u8; 32])).await.unwrap();

        assert_eq!(sweep_once(&store).await, 2);
        assert_eq!(sweep_once(&store).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_once_keeps_live_nonces() {
        let store = NonceStore::new(Arc::new(MemoryDirectory::new()), Duration::from_secs(300));
        let id = Identity::from_bytes([3u8; 32]);
        store.issue(&id).await.unwrap();

        assert_eq!(sweep_once(&store).await, 0);
        assert!(store.current(&id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_sweeps_on_interval() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = NonceStore::new(directory.clone(), Duration::ZERO);
        store.issue(&Identity::from_bytes([4u8; 32])).await.unwrap();

        let handle = tokio::spawn(run_sweep_loop(store, Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(directory.is_empty());
        handle.abort();
    }
}
