//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::backend::BackendRegistry;
use crate::cache::DistributedCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CleanupResponse, GetResponse, HealthResponse, KeyResponse, SetRequest, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache engine, whatever backend it runs on
    pub cache: Arc<dyn DistributedCache>,
    /// Cancelled on shutdown so queued requests stop before touching the store
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(cache: Arc<dyn DistributedCache>) -> Self {
        Self {
            cache,
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the configured backend from the default registry.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = BackendRegistry::with_defaults().build(config)?;
        Ok(Self::new(cache))
    }
}

/// Handler for PUT /cache/:key
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<KeyResponse>> {
    let options = req.expiration_options();
    state
        .cache
        .set(&key, req.value.into_bytes(), &options, &state.shutdown)
        .await?;

    Ok(Json(KeyResponse::set(key)))
}

/// Handler for GET /cache/:key
///
/// Absent and expired keys are both reported as 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key, &state.shutdown).await? {
        Some(value) => Ok(Json(GetResponse::new(key, &value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for POST /cache/:key/refresh
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    state.cache.refresh(&key, &state.shutdown).await?;
    Ok(Json(KeyResponse::refreshed(key)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    state.cache.remove(&key, &state.shutdown).await?;
    Ok(Json(KeyResponse::removed(key)))
}

/// Handler for POST /cleanup
///
/// Sweeps expired entries immediately, ignoring the cleanup interval.
pub async fn cleanup_handler(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let removed = state.cache.remove_expired_entries().await?;
    Ok(Json(CleanupResponse { removed }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.backend(), state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.backend()))
}
