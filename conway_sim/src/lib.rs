//! In-process Game of Life server.
//!
//! Implements the client's [`Backend`](conway_client::Backend) seam so the
//! viewer can run without an external service: it owns the boards, steps
//! them on a timer and answers subscriptions and remote calls.

pub mod config;
pub mod error;
pub mod life;
pub mod patterns;
pub mod server;

pub use config::SimConfig;
pub use error::SimError;
pub use server::{LocalServer, STATUS_RUNNING, STATUS_STABLE};
