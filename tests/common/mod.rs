#![allow(dead_code)]
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sharelimit::{LivenessStore, MemoryStore, PeerId, Result, ShareLimitError};

/// One peer's handle on a shared `MemoryStore`, with failures switchable
/// at runtime
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    pub fail_announce: AtomicBool,
    pub fail_discover: AtomicBool,
    always_failing: HashSet<PeerId>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_announce: AtomicBool::new(false),
            fail_discover: AtomicBool::new(false),
            always_failing: HashSet::new(),
        }
    }

    /// A store on which announces for `peer_id` always fail
    pub fn failing_announces_for(inner: Arc<MemoryStore>, peer_id: &str) -> Self {
        let mut store = Self::new(inner);
        store.always_failing.insert(PeerId::from(peer_id));
        store
    }

    pub fn set_fail_announce(&self, fail: bool) {
        self.fail_announce.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_discover(&self, fail: bool) {
        self.fail_discover.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LivenessStore for FlakyStore {
    async fn announce(&self, now: DateTime<Utc>, peer_id: &PeerId) -> Result<()> {
        if self.fail_announce.load(Ordering::SeqCst) || self.always_failing.contains(peer_id) {
            return Err(ShareLimitError::StoreUnavailable("announce refused".to_string()));
        }
        self.inner.announce(now, peer_id).await
    }

    async fn discover(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Vec<PeerId>> {
        if self.fail_discover.load(Ordering::SeqCst) {
            return Err(ShareLimitError::StoreUnavailable("discover refused".to_string()));
        }
        self.inner.discover(min, max).await
    }

    async fn cleanup(&self, until: DateTime<Utc>) -> Result<()> {
        self.inner.cleanup(until).await
    }
}
