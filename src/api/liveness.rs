use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{event, instrument, Level};

use super::messages::{AnnounceRequest, CleanupRequest, CleanupResponse, PeersQuery, PeersResponse};
use super::paths::is_valid_namespace;
use crate::error::{Result, ShareLimitError};
use crate::store::Registry;

fn timestamp(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ShareLimitError::Api(format!("timestamp out of range: {}", ms)))
}

#[instrument(skip(registry), level = "debug")]
pub async fn announce(
    Path(namespace): Path<String>,
    State(registry): State<Arc<Registry>>,
    Json(request): Json<AnnounceRequest>,
) -> Result<StatusCode> {
    if !is_valid_namespace(&namespace) {
        return Err(ShareLimitError::Api(format!("invalid namespace: {:?}", namespace)));
    }
    let now = timestamp(request.timestamp_ms)?;
    registry
        .get_or_create(&namespace)?
        .insert(now, &request.peer_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(registry), level = "debug")]
pub async fn peers(
    Path(namespace): Path<String>,
    Query(query): Query<PeersQuery>,
    State(registry): State<Arc<Registry>>,
) -> Result<Json<PeersResponse>> {
    if query.min_ms > query.max_ms {
        return Err(ShareLimitError::Api(format!(
            "min_ms {} is after max_ms {}",
            query.min_ms, query.max_ms
        )));
    }
    let (min, max) = (timestamp(query.min_ms)?, timestamp(query.max_ms)?);
    let peers = match registry.get(&namespace)? {
        Some(store) => store.range(min, max)?,
        None => Vec::new(),
    };
    Ok(Json(PeersResponse { peers }))
}

#[instrument(skip(registry), level = "debug")]
pub async fn cleanup(
    Path(namespace): Path<String>,
    State(registry): State<Arc<Registry>>,
    Json(request): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>> {
    let until = timestamp(request.until_ms)?;
    let removed = match registry.get(&namespace)? {
        Some(store) => store.remove_until(until)?,
        None => 0,
    };
    if removed > 0 {
        event!(
            Level::INFO,
            message = "Pruned stale liveness entries",
            namespace = namespace.as_str(),
            removed
        );
    }
    Ok(Json(CleanupResponse { removed }))
}
