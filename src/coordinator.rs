//! Coordinator: one `Peer` heartbeating in the background, wired to one
//! admission gate that application code waits on.
//!
//! Any announce or discover failure closes the gate (rate 0): with an
//! unknown or stale view of the fleet, this peer cannot know its share and
//! must not risk pushing the fleet over its total.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{event, info, Level};

use crate::clock::{Clock, SystemClock};
use crate::context::WaitContext;
use crate::error::{Result, ShareLimitError};
use crate::gate::RateGate;
use crate::peer::{Peer, PeerObserver};
use crate::peer_id::PeerId;
use crate::settings::PeerSettings;
use crate::store::LivenessStore;

/// Translates peer lifecycle events into gate rates
pub struct GateObserver {
    gate: Arc<dyn RateGate>,
    store: Arc<dyn LivenessStore>,
}

impl GateObserver {
    pub fn new(gate: Arc<dyn RateGate>, store: Arc<dyn LivenessStore>) -> Self {
        Self { gate, store }
    }
}

#[async_trait]
impl PeerObserver for GateObserver {
    fn on_announce_done(&self, result: std::result::Result<(), &ShareLimitError>) {
        if result.is_err() {
            self.gate.set_rate(0);
        }
    }

    fn on_discover_done(&self, result: std::result::Result<u32, &ShareLimitError>) {
        match result {
            Ok(share) => self.gate.set_rate(share),
            Err(_) => self.gate.set_rate(0),
        }
    }

    async fn on_cleanup_elected(&self, until: DateTime<Utc>) -> Result<()> {
        self.store.cleanup(until).await
    }
}

pub struct Coordinator {
    peer: Arc<Peer>,
    gate: Arc<dyn RateGate>,
    shutdown_tx: mpsc::Sender<()>,
    heartbeat: JoinHandle<()>,
}

impl Coordinator {
    /// Validate settings, build the peer and start heartbeating.
    /// Must be called from within a tokio runtime.
    pub fn start(
        settings: PeerSettings,
        store: Arc<dyn LivenessStore>,
        gate: Arc<dyn RateGate>,
    ) -> Result<Self> {
        Self::start_with_clock(settings, store, gate, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        settings: PeerSettings,
        store: Arc<dyn LivenessStore>,
        gate: Arc<dyn RateGate>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let observer = Arc::new(GateObserver::new(gate.clone(), store.clone()));
        let peer = Arc::new(Peer::new(&settings, store, observer, clock)?);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let heartbeat = tokio::spawn(peer.clone().run(shutdown_rx));
        info!(
            peer_id = %peer.id(),
            total_budget = peer.total_budget(),
            "Coordinator started"
        );

        Ok(Self {
            peer,
            gate,
            shutdown_tx,
            heartbeat,
        })
    }

    /// Block until this process may issue one more request
    pub async fn wait(&self, ctx: &WaitContext, fail_fast: bool) -> Result<()> {
        self.gate.wait(ctx, fail_fast).await
    }

    pub fn peer_id(&self) -> &PeerId {
        self.peer.id()
    }

    pub fn current_share(&self) -> u32 {
        self.peer.current_share()
    }

    pub fn peer_set(&self) -> Vec<PeerId> {
        self.peer.peer_set()
    }

    /// Rate the gate is currently admitting at
    pub fn rate(&self) -> u32 {
        self.gate.rate()
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    /// Stop heartbeating and wait for the current tick to finish.
    /// The gate keeps its last rate.
    pub async fn shutdown(self) {
        // a full channel means a shutdown is already pending
        let _ = self.shutdown_tx.try_send(());
        if let Err(err) = self.heartbeat.await {
            event!(
                Level::ERROR,
                message = "Heartbeat task ended abnormally",
                err = format!("{:?}", err)
            );
        }
        info!(peer_id = %self.peer.id(), "Coordinator stopped");
    }
}
