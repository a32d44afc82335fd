use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of delivery ids remembered by [`MemoryIdempotencyStore`].
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Trait for storing processed delivery ids to prevent duplicate processing
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Check if a delivery has already been processed
    async fn is_processed(&self, delivery_id: &str) -> Result<bool>;

    /// Mark a delivery as processed
    async fn mark_processed(&self, delivery_id: String) -> Result<()>;
}

/// In-memory idempotency store.
///
/// Remembers the most recent `capacity` delivery ids; the oldest id is
/// forgotten first. Entries do not survive a restart, so a redelivery after
/// a restart is dispatched again.
pub struct MemoryIdempotencyStore {
    inner: Arc<RwLock<Seen>>,
    capacity: usize,
}

#[derive(Default)]
struct Seen {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Seen::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ids.is_empty()
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn is_processed(&self, delivery_id: &str) -> Result<bool> {
        let seen = self.inner.read().await;
        Ok(seen.ids.contains(delivery_id))
    }

    async fn mark_processed(&self, delivery_id: String) -> Result<()> {
        let mut seen = self.inner.write().await;
        if !seen.ids.insert(delivery_id.clone()) {
            return Ok(());
        }
        seen.order.push_back(delivery_id);

        while seen.order.len() > self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.ids.remove(&oldest);
            }
        }
        Ok(())
    }
}
