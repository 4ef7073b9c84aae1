//! HTTP API
//!
//! `POST /chat` answers a prompt through the coordinator; the remaining routes
//! expose health, recent logs and stored conversations.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
