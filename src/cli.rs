//! CLI for this application
//!
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::peer_id::PeerId;
use crate::settings::{self, PeerSettings, RegistrySettings};

/// Registry service: hosts liveness namespaces for any number of fleets
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "sharelimit", version)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("SHARELIMIT_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("SHARELIMIT_HTTP_LISTEN_PORT"),
        help = "Port to bind the registry HTTP API to"
    )]
    pub listen_port: u16,

    #[clap(long, env("SHARELIMIT_LOG_JSON"), help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn into_settings(self) -> RegistrySettings {
        RegistrySettings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
        }
    }
}

/// Demo peer: joins a registry and spends its share in a loop
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "sharelimit-peer", version)]
pub struct PeerCli {
    #[clap(
        long,
        default_value = "http://127.0.0.1:8420",
        env("SHARELIMIT_REGISTRY_URL"),
        help = "Base URL of the registry service"
    )]
    pub registry_url: String,

    #[clap(
        long,
        default_value = "default",
        env("SHARELIMIT_NAMESPACE"),
        help = "Namespace shared by every peer of the fleet"
    )]
    pub namespace: String,

    #[clap(long, env("SHARELIMIT_PEER_ID"), help = "Peer id (generated if unset)")]
    pub peer_id: Option<String>,

    #[clap(
        long,
        env("SHARELIMIT_TOTAL_BUDGET"),
        help = "Fleet-wide requests per second"
    )]
    pub total_budget: u32,

    #[clap(
        long,
        default_value = "30000",
        env("SHARELIMIT_HEARTBEAT_MS"),
        help = "Heartbeat interval in milliseconds"
    )]
    pub heartbeat_ms: u64,

    #[clap(
        long,
        env("SHARELIMIT_WINDOW_MS"),
        help = "Discovery window in milliseconds (defaults to the heartbeat interval)"
    )]
    pub window_ms: Option<u64>,

    #[clap(
        long,
        env("SHARELIMIT_CLEANUP_MS"),
        help = "Cleanup interval in milliseconds (defaults to 100 heartbeats)"
    )]
    pub cleanup_ms: Option<u64>,

    #[clap(
        long,
        env("SHARELIMIT_FAIL_FAST"),
        help = "Reject instead of blocking while no budget is available"
    )]
    pub fail_fast: bool,

    #[clap(
        long,
        default_value = "2000",
        env("SHARELIMIT_REQUEST_TIMEOUT_MS"),
        help = "Timeout for each registry call in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[clap(long, env("SHARELIMIT_LOG_JSON"), help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl PeerCli {
    pub fn into_settings(self) -> crate::error::Result<PeerSettings> {
        let mut settings = PeerSettings::new(self.total_budget)
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_ms));
        if let Some(peer_id) = self.peer_id {
            settings.peer_id = Some(PeerId::new(peer_id)?);
        }
        if let Some(window_ms) = self.window_ms {
            settings = settings.with_heartbeat_window(Duration::from_millis(window_ms));
        }
        if let Some(cleanup_ms) = self.cleanup_ms {
            settings = settings.with_cleanup_interval(Duration::from_millis(cleanup_ms));
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Install the global tracing subscriber for a binary
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sharelimit=debug,tower_http=debug".into());
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
