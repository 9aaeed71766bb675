//! Share one fleet-wide request rate between independent processes.
//!
//! Each process runs a [`coordinator::Coordinator`]: a peer that heartbeats
//! into a shared [`store::LivenessStore`], discovers the other live peers,
//! computes its own fair share of the total budget and feeds that share to
//! a local [`gate::RateGate`]. Application code only calls `wait`.
pub mod api;
pub mod cli;
pub mod clock;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod peer;
pub mod peer_id;
pub mod settings;
pub mod store;

pub use context::{CancelHandle, WaitContext};
pub use coordinator::Coordinator;
pub use error::{Result, ShareLimitError};
pub use gate::{RateGate, TokenBucketGate};
pub use peer_id::PeerId;
pub use settings::PeerSettings;
pub use store::{HttpStore, LivenessStore, MemoryStore, Registry};
