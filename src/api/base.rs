use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::settings::{APP_NAME, APP_VERSION};
use crate::store::Registry;

pub async fn root() -> &'static str {
    "sharelimit registry: liveness namespaces under /v1/namespaces"
}

pub async fn health() -> &'static str {
    "OK"
}

/// Build identity plus the namespaces this registry currently hosts
#[derive(Debug, Serialize, Deserialize)]
pub struct AboutResponse {
    pub name: String,
    pub version: String,
    pub namespaces: Vec<String>,
}

#[instrument(skip(registry), level = "debug")]
pub async fn about(State(registry): State<Arc<Registry>>) -> axum::Json<AboutResponse> {
    axum::Json(AboutResponse {
        name: APP_NAME.to_string(),
        version: APP_VERSION.to_string(),
        namespaces: registry.namespace_names(),
    })
}
