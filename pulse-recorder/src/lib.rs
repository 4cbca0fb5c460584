//! Recording HTTP proxy
//!
//! A client configures this proxy as its upstream. Plain HTTP requests are
//! captured and forwarded; `CONNECT` requests open an opaque TCP tunnel
//! whose bytes are never inspected. Each observation is offered to a live
//! event channel (best effort, lossy); the authoritative record is the
//! session artifact written when the recorder stops.

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod proxy;

pub use config::RecorderConfig;
pub use error::RecorderError;
pub use event::RecorderEvent;
pub use proxy::{Recorder, RecorderState};
