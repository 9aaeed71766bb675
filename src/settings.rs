//! sharelimit settings
use std::time::Duration;

use crate::config_error;
use crate::error::Result;
use crate::peer_id::PeerId;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8420;
pub const DEFAULT_PORT_HTTP: &str = "8420";

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Cleanup runs once per this many heartbeats unless configured
pub const DEFAULT_CLEANUP_HEARTBEATS: u32 = 100;
/// Upper bound on the discovery window and the cleanup interval; larger
/// values cannot be added to a wall-clock timestamp
pub const MAX_CONFIGURED_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Settings for one peer of the fleet
#[derive(Clone, Debug)]
pub struct PeerSettings {
    // Stable identity; generated when absent
    pub peer_id: Option<PeerId>,

    // Fleet-wide admitted requests per second
    pub total_budget: u32,

    // Cadence of the announce/discover/cleanup cycle
    pub heartbeat_interval: Duration,

    // Skew tolerance on both sides of "now" when discovering (default: interval)
    pub heartbeat_window: Option<Duration>,

    // Minimum time between cleanups (default: 100 heartbeats)
    pub cleanup_interval: Option<Duration>,
}

impl PeerSettings {
    pub fn new(total_budget: u32) -> Self {
        Self {
            peer_id: None,
            total_budget,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_window: None,
            cleanup_interval: None,
        }
    }

    pub fn with_peer_id(mut self, peer_id: impl Into<PeerId>) -> Self {
        self.peer_id = Some(peer_id.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_heartbeat_window(mut self, window: Duration) -> Self {
        self.heartbeat_window = Some(window);
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    pub fn effective_window(&self) -> Duration {
        self.heartbeat_window.unwrap_or(self.heartbeat_interval)
    }

    pub fn effective_cleanup_interval(&self) -> Duration {
        self.cleanup_interval.unwrap_or_else(|| {
            self.heartbeat_interval
                .checked_mul(DEFAULT_CLEANUP_HEARTBEATS)
                .unwrap_or(Duration::MAX)
        })
    }

    /// Reject settings that indicate a programming or deployment mistake
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(config_error!("heartbeat interval must be greater than zero"));
        }
        if self.effective_window() < self.heartbeat_interval {
            return Err(config_error!(
                "heartbeat window {:?} is shorter than heartbeat interval {:?}",
                self.effective_window(),
                self.heartbeat_interval
            ));
        }
        if self.effective_window() > MAX_CONFIGURED_DURATION {
            return Err(config_error!(
                "heartbeat window {:?} exceeds the maximum of {:?}",
                self.effective_window(),
                MAX_CONFIGURED_DURATION
            ));
        }
        let cleanup_interval = self.effective_cleanup_interval();
        if cleanup_interval.is_zero() {
            return Err(config_error!("cleanup interval must be greater than zero"));
        }
        if cleanup_interval > MAX_CONFIGURED_DURATION {
            return Err(config_error!(
                "cleanup interval {:?} exceeds the maximum of {:?}",
                cleanup_interval,
                MAX_CONFIGURED_DURATION
            ));
        }
        if let Some(peer_id) = &self.peer_id {
            PeerId::new(peer_id.as_str())?;
        }
        Ok(())
    }
}

/// Settings for the registry service binary
#[derive(Clone, Debug)]
pub struct RegistrySettings {
    pub listen_address: String,
    pub listen_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PeerSettings::new(10);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.effective_window(), DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(
            settings.effective_cleanup_interval(),
            DEFAULT_HEARTBEAT_INTERVAL * 100
        );
    }

    #[test]
    fn test_window_shorter_than_interval_rejected() {
        let settings = PeerSettings::new(10)
            .with_heartbeat_interval(Duration::from_secs(2))
            .with_heartbeat_window(Duration::from_secs(1));
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("shorter than heartbeat interval"));
    }

    #[test]
    fn test_wider_window_accepted() {
        let settings = PeerSettings::new(10)
            .with_heartbeat_interval(Duration::from_secs(1))
            .with_heartbeat_window(Duration::from_secs(3));
        assert!(settings.validate().is_ok());
        assert_eq!(settings.effective_window(), Duration::from_secs(3));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        // ~317k years, far past what a timestamp can hold
        let huge = Duration::from_millis(10_000_000_000_000_000);
        let settings = PeerSettings::new(10)
            .with_heartbeat_interval(Duration::from_secs(1))
            .with_heartbeat_window(huge);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat window"));

        let settings = PeerSettings::new(10)
            .with_heartbeat_interval(Duration::from_secs(1))
            .with_cleanup_interval(huge);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("cleanup interval"));

        // the default cleanup interval scales with the heartbeat
        let settings = PeerSettings::new(10)
            .with_heartbeat_interval(Duration::from_secs(2 * 365 * 24 * 60 * 60))
            .with_heartbeat_window(Duration::from_secs(2 * 365 * 24 * 60 * 60));
        assert!(settings.validate().is_err());

        let settings = PeerSettings::new(10)
            .with_heartbeat_interval(Duration::from_secs(1))
            .with_heartbeat_window(MAX_CONFIGURED_DURATION);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let settings = PeerSettings::new(10).with_heartbeat_interval(Duration::ZERO);
        assert!(settings.validate().is_err());

        let settings = PeerSettings::new(10).with_cleanup_interval(Duration::ZERO);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_blank_peer_id_rejected() {
        let settings = PeerSettings::new(10).with_peer_id("  ");
        assert!(settings.validate().is_err());
    }
}
