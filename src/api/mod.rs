//! API Module
//!
//! HTTP handlers and routing for the state service REST API.
//!
//! # Endpoints
//! - `GET|PUT|DELETE /state/:namespace/:user_id` - Read, write, clear state
//! - `DELETE /cache/:namespace/:user_id` - Invalidate the cached copy
//! - `GET /stats` - Get cache statistics

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
