//! HTTP surface for Scholar: token-gated API routes plus the public key
//! endpoint other services use to verify tokens.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
