//! Control surface for the pulse toolkit
//!
//! A small REST API that starts and stops the recording proxy, lists
//! recorded sessions, launches scenario runs, accepts events from
//! external worker processes, and fans everything out to SSE subscribers
//! through the shared event bus.

pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod state;

pub use app::create_app;
pub use config::ServerConfig;
pub use errors::ApiError;
pub use state::AppState;
