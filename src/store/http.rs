//! `LivenessStore` client for the registry service
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use super::LivenessStore;
use crate::api::messages::{AnnounceRequest, CleanupRequest, CleanupResponse, PeersQuery, PeersResponse};
use crate::api::paths::{self, namespace_path};
use crate::error::Result;
use crate::peer_id::PeerId;
use crate::store_error;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    namespace: String,
}

impl HttpStore {
    /// `base_url` is the registry root, e.g. `http://127.0.0.1:8420`
    pub fn new(base_url: &str, namespace: &str, request_timeout: Duration) -> Result<Self> {
        if !paths::is_valid_namespace(namespace) {
            return Err(crate::config_error!("Invalid namespace: {:?}", namespace));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| crate::config_error!("Failed building HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.to_string(),
        })
    }

    fn url(&self, template: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            namespace_path(template, &self.namespace)
        )
    }
}

#[async_trait]
impl LivenessStore for HttpStore {
    async fn announce(&self, now: DateTime<Utc>, peer_id: &PeerId) -> Result<()> {
        let request = AnnounceRequest {
            peer_id: peer_id.clone(),
            timestamp_ms: now.timestamp_millis(),
        };
        let resp = self
            .client
            .post(self.url(paths::liveness::ANNOUNCE))
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(store_error!("announce rejected with status {}", resp.status()));
        }
        Ok(())
    }

    async fn discover(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Vec<PeerId>> {
        let query = PeersQuery {
            min_ms: min.timestamp_millis(),
            max_ms: max.timestamp_millis(),
        };
        let resp = self
            .client
            .get(self.url(paths::liveness::PEERS))
            .query(&query)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(store_error!("discover rejected with status {}", resp.status()));
        }
        let body: PeersResponse = resp.json().await?;
        Ok(body.peers)
    }

    async fn cleanup(&self, until: DateTime<Utc>) -> Result<()> {
        let resp = self
            .client
            .post(self.url(paths::liveness::CLEANUP))
            .json(&CleanupRequest {
                until_ms: until.timestamp_millis(),
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(store_error!("cleanup rejected with status {}", resp.status()));
        }
        let body: CleanupResponse = resp.json().await?;
        debug!(removed = body.removed, "Registry cleanup finished");
        Ok(())
    }
}
