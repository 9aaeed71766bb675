//! Joins a fleet through the registry service and spends this peer's share
//! of the fleet budget as fast as the gate allows, logging admissions.
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::{interval, Instant};
use tracing::{info, warn};

use sharelimit::cli::{self, PeerCli};
use sharelimit::{Coordinator, HttpStore, ShareLimitError, TokenBucketGate, WaitContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = PeerCli::parse();
    cli::init_tracing(args.log_json);

    let store = Arc::new(HttpStore::new(
        &args.registry_url,
        &args.namespace,
        args.request_timeout(),
    )?);
    let fail_fast = args.fail_fast;
    let settings = args.into_settings()?;
    let coordinator = Coordinator::start(settings, store, Arc::new(TokenBucketGate::new()))?;
    info!(peer_id = %coordinator.peer_id(), "Peer joined");

    let mut report = interval(Duration::from_secs(1));
    let mut admitted: u64 = 0;
    let mut rejected: u64 = 0;
    let mut window_start = Instant::now();

    loop {
        let ctx = WaitContext::with_timeout(Duration::from_secs(1));
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                info!(
                    admitted,
                    rejected,
                    share = coordinator.current_share(),
                    peers = coordinator.peer_set().len(),
                    elapsed_ms = window_start.elapsed().as_millis() as u64,
                    "Admissions"
                );
                admitted = 0;
                rejected = 0;
                window_start = Instant::now();
            }
            result = coordinator.wait(&ctx, fail_fast) => {
                match result {
                    Ok(()) => admitted += 1,
                    Err(ShareLimitError::Unavailable) => {
                        rejected += 1;
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Err(err) if err.is_cancellation() => {}
                    Err(err) => warn!(err = %err, "Wait failed"),
                }
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
