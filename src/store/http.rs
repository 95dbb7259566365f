//! HTTP document store adapter.
//!
//! Talks to a REST document service:
//! `GET|PUT|DELETE {base_url}/{collection}/{user_id}` with a JSON
//! [`RemoteRecord`] body. Requests go through the shared [`ConnectionPool`],
//! which owns the retry policy.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use tracing::{debug, instrument};

use crate::error::{Result, StateError};
use crate::pool::ConnectionPool;
use crate::service::StateKey;
use crate::store::{RemoteRecord, RemoteStore};

pub struct HttpDocumentStore {
    base_url: Url,
    token: Option<String>,
    pool: Arc<ConnectionPool>,
}

impl HttpDocumentStore {
    /// Creates an adapter rooted at `base_url`, e.g.
    /// `https://store.example.com/v1`.
    pub fn new(base_url: &str, token: Option<String>, pool: Arc<ConnectionPool>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StateError::InvalidRequest(format!("Invalid store URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StateError::InvalidRequest(format!(
                "Store URL '{}' cannot be used as a base",
                base_url
            )));
        }
        Ok(Self {
            base_url,
            token,
            pool,
        })
    }

    /// Document URL for `key`; the user id is percent-encoded as one segment.
    fn document_url(&self, key: &StateKey) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StateError::Internal(format!("Store URL '{}' has no path", self.base_url)))?
            .pop_if_empty()
            .push(key.namespace().collection())
            .push(key.user_id());
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Collapses transport failures into `StoreUnavailable`; pool exhaustion
/// stays distinct so callers can tell it apart.
fn unavailable(err: StateError) -> StateError {
    match err {
        StateError::Transport(msg) => StateError::StoreUnavailable(msg),
        other => other,
    }
}

fn unexpected_status(key: &StateKey, status: StatusCode) -> StateError {
    StateError::StoreUnavailable(format!("Store answered {} for {}", status, key))
}

#[async_trait]
impl RemoteStore for HttpDocumentStore {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn load(&self, key: &StateKey) -> Result<RemoteRecord> {
        let url = self.document_url(key)?;
        let reply = self
            .pool
            .send(&url, |client, url| self.authorize(client.get(url.clone())))
            .await
            .map_err(unavailable)?;

        match reply.status {
            status if status.is_success() => reply.json().map_err(unavailable),
            StatusCode::NOT_FOUND => {
                debug!("Record not found in store");
                Err(StateError::NotFound(key.to_string()))
            }
            status => Err(unexpected_status(key, status)),
        }
    }

    #[instrument(skip(self, key, record), fields(key = %key))]
    async fn save(&self, key: &StateKey, record: &RemoteRecord) -> Result<()> {
        let url = self.document_url(key)?;
        let reply = self
            .pool
            .send(&url, |client, url| {
                self.authorize(client.put(url.clone()).json(record))
            })
            .await
            .map_err(unavailable)?;

        if reply.status.is_success() {
            Ok(())
        } else {
            Err(unexpected_status(key, reply.status))
        }
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn delete(&self, key: &StateKey) -> Result<()> {
        let url = self.document_url(key)?;
        let reply = self
            .pool
            .send(&url, |client, url| self.authorize(client.delete(url.clone())))
            .await
            .map_err(unavailable)?;

        if reply.status.is_success() || reply.status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(unexpected_status(key, reply.status))
        }
    }
}
