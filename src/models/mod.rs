//! Request and Response models for the state API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::SetStateRequest;
pub use responses::{GetStateResponse, InvalidateResponse, SetStateResponse, StatsResponse};
