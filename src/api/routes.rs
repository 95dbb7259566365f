//! API Routes
//!
//! Configures the Axum router with all state service endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_state_handler, get_state_handler, invalidate_handler, set_state_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /state/:namespace/:user_id` - Read a user's state
/// - `PUT /state/:namespace/:user_id` - Write a user's state
/// - `DELETE /state/:namespace/:user_id` - Clear a user's state
/// - `DELETE /cache/:namespace/:user_id` - Drop the cached copy only
/// - `GET /stats` - Get cache statistics
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/state/:namespace/:user_id",
            get(get_state_handler)
                .put(set_state_handler)
                .delete(clear_state_handler),
        )
        .route("/cache/:namespace/:user_id", delete(invalidate_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::StateService;
    use crate::store::MemoryDocumentStore;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = StateService::with_store(store, 100, Some(Duration::from_secs(300)));
        create_router(AppState::new(service))
    }

    async fn status_of(method: Method, uri: &str, body: Option<&'static str>) -> StatusCode {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map_or_else(Body::empty, Body::from))
            .unwrap();

        create_test_app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_stats_route() {
        assert_eq!(status_of(Method::GET, "/stats", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_state_routes() {
        let put = status_of(
            Method::PUT,
            "/state/conversation/42",
            Some(r#"{"value":{"step":"ask_phone"}}"#),
        )
        .await;
        assert_eq!(put, StatusCode::OK);

        // Unknown users read as the namespace default
        assert_eq!(status_of(Method::GET, "/state/language/nobody", None).await, StatusCode::OK);
        assert_eq!(status_of(Method::DELETE, "/state/ui/42", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalidate_route() {
        assert_eq!(status_of(Method::DELETE, "/cache/ui/42", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_bad_request() {
        assert_eq!(
            status_of(Method::GET, "/state/wallet/42", None).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_unrouted_method() {
        assert_eq!(
            status_of(Method::POST, "/state/ui/42", None).await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
