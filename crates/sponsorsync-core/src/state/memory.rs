// # Memory Sponsor Store
//
// In-memory implementation of SponsorStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for dry runs against upstream.
//
// ## Crash Behavior
//
// - All rows are lost on restart/crash
// - The next run re-crawls from page 1 and rebuilds every row, but sticky
//   first-pay times learned from earlier observations are gone

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::traits::sponsor_store::{
    MergePolicy, RunMetadata, SponsorRecord, SponsorStore, SponsorUpsert, merge_sponsor,
};
use crate::Error;

/// In-memory sponsor store
///
/// All rows live in HashMaps protected by a single RwLock; an upsert holds
/// the write lock across its read-modify-write.
///
/// # Example
///
/// ```rust,no_run
/// use sponsorsync_core::state::MemorySponsorStore;
/// use sponsorsync_core::traits::SponsorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySponsorStore::new();
///
///     store.upsert_run_metadata("last_sync_time", "1700000000", 1700000000).await?;
///     let meta = store.get_run_metadata("last_sync_time").await?;
///     assert_eq!(meta.map(|m| m.value), Some("1700000000".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySponsorStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    sponsors: HashMap<String, SponsorRecord>,
    metadata: HashMap<String, RunMetadata>,
}

impl MemorySponsorStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored sponsor
    pub async fn sponsors(&self) -> Vec<SponsorRecord> {
        self.inner.read().await.sponsors.values().cloned().collect()
    }

    /// Check if the store holds no sponsors
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sponsors.is_empty()
    }
}

#[async_trait]
impl SponsorStore for MemorySponsorStore {
    async fn upsert_sponsor(&self, upsert: &SponsorUpsert, policy: MergePolicy) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp();
        let mut guard = self.inner.write().await;
        let merged = merge_sponsor(guard.sponsors.get(&upsert.user_id), upsert, policy, now);
        guard.sponsors.insert(upsert.user_id.clone(), merged);
        Ok(())
    }

    async fn get_sponsor(&self, user_id: &str) -> Result<Option<SponsorRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.sponsors.get(user_id).cloned())
    }

    async fn sponsor_count(&self) -> Result<usize, Error> {
        Ok(self.inner.read().await.sponsors.len())
    }

    async fn upsert_run_metadata(&self, key: &str, value: &str, timestamp: i64) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.metadata.insert(
            key.to_string(),
            RunMetadata {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: timestamp,
            },
        );
        Ok(())
    }

    async fn get_run_metadata(&self, key: &str) -> Result<Option<RunMetadata>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.metadata.get(key).cloned())
    }
}
