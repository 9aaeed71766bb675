//! Wire types shared by the registry service and `HttpStore`
use serde::{Deserialize, Serialize};

use crate::peer_id::PeerId;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnnounceRequest {
    pub peer_id: PeerId,
    pub timestamp_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PeersQuery {
    pub min_ms: i64,
    pub max_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerId>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CleanupRequest {
    pub until_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_ids_serialize_as_plain_strings() {
        let response = PeersResponse {
            peers: vec![PeerId::from("a"), PeerId::from("b")],
        };
        let json = serde_json::to_string(&response).expect("Should serialize");
        assert_eq!(json, r#"{"peers":["a","b"]}"#);

        let deserialized: PeersResponse = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(deserialized, response);
    }
}
