//! Shared liveness store
//!
//! Every peer of a fleet writes `(timestamp, peer_id)` liveness entries into
//! one namespace and reads back the peers that were live within a window.
//! The store is the only thing peers share; there is no direct peer-to-peer
//! traffic.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod http;
pub mod memory;

use crate::error::Result;
use crate::peer_id::PeerId;
pub use http::HttpStore;
pub use memory::{MemoryStore, Registry};

#[async_trait]
pub trait LivenessStore: Send + Sync {
    /// Record that `peer_id` was alive at `now`. Called every heartbeat.
    async fn announce(&self, now: DateTime<Utc>, peer_id: &PeerId) -> Result<()>;

    /// Peers with a liveness entry in `[min, max]`, each at most once
    async fn discover(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Vec<PeerId>>;

    /// Best-effort prune of entries at or before `until`.
    /// Stores without pruning support may keep this no-op.
    async fn cleanup(&self, _until: DateTime<Utc>) -> Result<()> {
        Ok(())
    }
}
