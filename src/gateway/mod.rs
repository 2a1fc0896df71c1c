//! HTTP surface: access gate, router, server

pub mod auth;
pub mod router;
mod server;

pub use auth::{AccessGate, Unauthorized, gate_middleware};
pub use router::{ApiError, AppState, create_router};
pub use server::Server;
