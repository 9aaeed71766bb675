use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config_error;
use crate::error::Result;

/// Unique identifier for a peer in the fleet.
///
/// Ordering is plain lexicographic string ordering; fair-share division
/// and the cleanup election both depend on it.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Accept a configured id verbatim (surrounding whitespace trimmed)
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(config_error!("Peer id cannot be empty"));
        }
        Ok(Self(id.to_string()))
    }

    /// Produce a statistically unique id for this process
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        PeerId(id)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<PeerId> = (0..1000).map(|_| PeerId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_configured_id_is_trimmed() {
        let id = PeerId::new("  caller0\n").unwrap();
        assert_eq!(id.as_str(), "caller0");
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(PeerId::new("").is_err());
        assert!(PeerId::new("   ").is_err());
    }

    #[test]
    fn test_lexicographic_ordering() {
        let mut ids = vec![PeerId::from("b"), PeerId::from("a10"), PeerId::from("a2")];
        ids.sort();
        assert_eq!(
            ids,
            vec![PeerId::from("a10"), PeerId::from("a2"), PeerId::from("b")]
        );
    }
}
