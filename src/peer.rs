//! Peer coordination loop.
//!
//! Every heartbeat a peer
//!
//! 1. discovers the peers that were live within `[now - window, now + window]`
//!    and recomputes its fair share of the fleet budget (skipped when the
//!    previous announce failed),
//! 2. announces its own liveness,
//! 3. runs the cleanup election.
//!
//! Peers never talk to each other. Every peer sorts the same discovered set
//! the same way, so they all agree on who gets the remainder of the budget
//! and on who prunes the store, without negotiating.
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config_error;
use crate::error::{Result, ShareLimitError};
use crate::peer_id::PeerId;
use crate::settings::PeerSettings;
use crate::store::LivenessStore;
use crate::store_error;

/// Sort and de-duplicate a discovered peer set
pub fn sorted_peer_set(mut peer_ids: Vec<PeerId>) -> Vec<PeerId> {
    peer_ids.sort();
    peer_ids.dedup();
    peer_ids
}

/// Share of `total_budget` owed to `me` within a sorted peer set.
///
/// Every member gets `total / n`; the first `total % n` members in sorted
/// order get one more. A peer missing from the set gets nothing.
pub fn fair_share(total_budget: u32, me: &PeerId, sorted_peers: &[PeerId]) -> u32 {
    if sorted_peers.is_empty() {
        return 0;
    }
    let Ok(position) = sorted_peers.binary_search(me) else {
        return 0;
    };
    // a fleet larger than u32::MAX would only ever get zero shares anyway
    let n = u32::try_from(sorted_peers.len()).unwrap_or(u32::MAX);
    let base = total_budget / n;
    let remainder = (total_budget % n) as usize;
    if position < remainder {
        base + 1
    } else {
        base
    }
}

/// Lifecycle events a peer emits once per heartbeat step
#[async_trait]
pub trait PeerObserver: Send + Sync {
    fn on_announce_done(&self, result: std::result::Result<(), &ShareLimitError>);

    /// `Ok` carries the freshly computed share
    fn on_discover_done(&self, result: std::result::Result<u32, &ShareLimitError>);

    /// This peer won the cleanup election; prune entries at or before `until`
    async fn on_cleanup_elected(&self, until: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug)]
struct PeerState {
    share: u32,
    peer_set: Vec<PeerId>,
    last_announce_failed: bool,
    last_cleanup_at: DateTime<Utc>,
}

pub struct Peer {
    id: PeerId,
    total_budget: u32,
    heartbeat_interval: Duration,
    heartbeat_window: chrono::Duration,
    cleanup_interval: chrono::Duration,
    store: Arc<dyn LivenessStore>,
    observer: Arc<dyn PeerObserver>,
    clock: Arc<dyn Clock>,
    state: RwLock<PeerState>,
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("total_budget", &self.total_budget)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}

impl Peer {
    pub fn new(
        settings: &PeerSettings,
        store: Arc<dyn LivenessStore>,
        observer: Arc<dyn PeerObserver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;
        let id = match &settings.peer_id {
            Some(id) => PeerId::new(id.as_str())?,
            None => PeerId::generate(),
        };
        let heartbeat_window = chrono::Duration::from_std(settings.effective_window())
            .map_err(|e| config_error!("heartbeat window out of range: {}", e))?;
        let cleanup_interval = chrono::Duration::from_std(settings.effective_cleanup_interval())
            .map_err(|e| config_error!("cleanup interval out of range: {}", e))?;

        Ok(Self {
            id,
            total_budget: settings.total_budget,
            heartbeat_interval: settings.heartbeat_interval,
            heartbeat_window,
            cleanup_interval,
            store,
            observer,
            clock,
            state: RwLock::new(PeerState {
                share: 0,
                peer_set: Vec::new(),
                last_announce_failed: false,
                last_cleanup_at: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, PeerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PeerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn total_budget(&self) -> u32 {
        self.total_budget
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn current_share(&self) -> u32 {
        self.read().share
    }

    /// Most recent sorted set of live peers
    pub fn peer_set(&self) -> Vec<PeerId> {
        self.read().peer_set.clone()
    }

    pub fn last_announce_failed(&self) -> bool {
        self.read().last_announce_failed
    }

    /// Replace the known peer set and recompute this peer's share
    pub fn adjust_share(&self, peer_ids: Vec<PeerId>) -> u32 {
        let peer_set = sorted_peer_set(peer_ids);
        let share = fair_share(self.total_budget, &self.id, &peer_set);
        let peers = peer_set.len();
        {
            let mut state = self.write();
            state.share = share;
            state.peer_set = peer_set;
        }
        debug!(peer_id = %self.id, share, peers, "Recomputed fair share");
        share
    }

    /// Step 1: find live peers and recompute the share
    pub async fn discover(&self) {
        if self.last_announce_failed() {
            debug!(peer_id = %self.id, "Skipping discover after failed announce");
            return;
        }
        let now = self.clock.now();
        let window = now
            .checked_sub_signed(self.heartbeat_window)
            .zip(now.checked_add_signed(self.heartbeat_window));
        let Some((min, max)) = window else {
            let err = store_error!("discovery window around {} is out of range", now);
            warn!(peer_id = %self.id, err = %err, "Discover failed");
            self.observer.on_discover_done(Err(&err));
            return;
        };
        match self.store.discover(min, max).await {
            Ok(peer_ids) => {
                let share = self.adjust_share(peer_ids);
                self.observer.on_discover_done(Ok(share));
            }
            Err(err) => {
                warn!(peer_id = %self.id, err = %err, "Discover failed");
                self.observer.on_discover_done(Err(&err));
            }
        }
    }

    /// Step 2: record our own liveness
    pub async fn announce(&self) {
        let now = self.clock.now();
        let result = self.store.announce(now, &self.id).await;
        self.write().last_announce_failed = result.is_err();
        if let Err(err) = &result {
            warn!(peer_id = %self.id, err = %err, "Announce failed");
        }
        self.observer.on_announce_done(result.as_ref().map(|_| ()));
    }

    /// Decide whether this peer cleans up this round.
    ///
    /// Returns the cutoff to prune up to: the previous cleanup time, so
    /// entries that only just expired survive one more round.
    pub fn elect_cleanup(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let mut state = self.write();
        let first = state.peer_set.first()?;
        if first != &self.id || now - state.last_cleanup_at < self.cleanup_interval {
            return None;
        }
        let until = state.last_cleanup_at;
        state.last_cleanup_at = now;
        Some(until)
    }

    /// Step 3: cleanup election; failures are reported, never retried
    pub async fn cleanup(&self) {
        let Some(until) = self.elect_cleanup() else {
            return;
        };
        info!(peer_id = %self.id, until = %until, "Elected to clean up liveness entries");
        if let Err(err) = self.observer.on_cleanup_elected(until).await {
            warn!(peer_id = %self.id, err = %err, "Cleanup failed");
        }
    }

    /// One full heartbeat. Steps run in order and never overlap.
    pub async fn tick(&self) {
        self.discover().await;
        self.announce().await;
        self.cleanup().await;
    }

    /// Heartbeat forever, until `shutdown` fires or its sender is dropped.
    /// A tick in progress always runs to completion.
    pub async fn run(self: Arc<Self>, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            peer_id = %self.id,
            total_budget = self.total_budget,
            interval_ms = self.heartbeat_interval.as_millis() as u64,
            "Peer heartbeat started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            self.tick().await;
        }
        info!(peer_id = %self.id, "Peer heartbeat stopped");
    }
}
