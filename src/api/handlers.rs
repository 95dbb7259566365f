//! API Handlers
//!
//! HTTP request handlers for each state service endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::warn;

use crate::cache::BoundedTtlCache;
use crate::config::Config;
use crate::error::{Result, StateError};
use crate::models::{
    GetStateResponse, InvalidateResponse, SetStateRequest, SetStateResponse, StatsResponse,
};
use crate::pool::ConnectionPool;
use crate::service::{StateCategory, StateKey, StateService};
use crate::store::{HttpDocumentStore, MemoryDocumentStore, RemoteStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StateService>,
}

impl AppState {
    pub fn new(service: StateService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Wires the cache, store and pool from configuration.
    ///
    /// Without `STORE_URL` the service runs in limited mode: state lives in
    /// an in-process store and is lost on restart.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn RemoteStore> = match &config.store_url {
            Some(url) => {
                let pool = Arc::new(ConnectionPool::new(config.pool_config()?));
                Arc::new(HttpDocumentStore::new(url, config.store_token.clone(), pool)?)
            }
            None => {
                warn!("STORE_URL not set, running in limited mode with an in-memory store");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let cache = Arc::new(BoundedTtlCache::new(config.max_entries, config.state_ttl()));
        Ok(Self::new(StateService::new(
            cache,
            store,
            config.policy()?,
            config.defaults(),
        )))
    }
}

fn state_key(namespace: &str, user_id: String) -> Result<StateKey> {
    StateKey::new(namespace.parse()?, user_id)
}

/// Turns a deferred critical write into a 202 instead of an error.
fn write_outcome(
    key: &StateKey,
    category: StateCategory,
    outcome: Result<()>,
) -> Result<(StatusCode, Json<SetStateResponse>)> {
    match outcome {
        Ok(()) => Ok((StatusCode::OK, Json(SetStateResponse::saved(key, category)))),
        Err(StateError::PersistenceDeferred { reason, .. }) => Ok((
            StatusCode::ACCEPTED,
            Json(SetStateResponse::deferred(key, reason)),
        )),
        Err(err) => Err(err),
    }
}

/// Handler for GET /state/:namespace/:user_id
pub async fn get_state_handler(
    State(state): State<AppState>,
    Path((namespace, user_id)): Path<(String, String)>,
) -> Result<Json<GetStateResponse>> {
    let key = state_key(&namespace, user_id)?;
    let value = state.service.get_state(&key).await?;

    Ok(Json(GetStateResponse::new(&key, value)))
}

/// Handler for PUT /state/:namespace/:user_id
///
/// Uses the namespace's configured category unless the body names one.
pub async fn set_state_handler(
    State(state): State<AppState>,
    Path((namespace, user_id)): Path<(String, String)>,
    Json(req): Json<SetStateRequest>,
) -> Result<(StatusCode, Json<SetStateResponse>)> {
    let key = state_key(&namespace, user_id)?;
    let category = req
        .category
        .unwrap_or_else(|| state.service.category(key.namespace()));

    let outcome = state.service.set_state(&key, req.value, category).await;
    write_outcome(&key, category, outcome)
}

/// Handler for DELETE /state/:namespace/:user_id
pub async fn clear_state_handler(
    State(state): State<AppState>,
    Path((namespace, user_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<SetStateResponse>)> {
    let key = state_key(&namespace, user_id)?;
    let category = state.service.category(key.namespace());

    let outcome = state.service.set_state(&key, Value::Null, category).await;
    write_outcome(&key, category, outcome)
}

/// Handler for DELETE /cache/:namespace/:user_id
///
/// Drops the cached copy only; the stored record is untouched.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path((namespace, user_id)): Path<(String, String)>,
) -> Result<Json<InvalidateResponse>> {
    let key = state_key(&namespace, user_id)?;
    let invalidated = state.service.invalidate(&key);

    Ok(Json(InvalidateResponse::new(&key, invalidated)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.service.stats()))
}
