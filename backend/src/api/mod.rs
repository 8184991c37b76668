//! HTTP API module.
//!
//! This module provides the HTTP server and response types the gallery view
//! talks to.

pub mod server;
pub mod types;

pub use server::{router, serve, start_server, AppState};
pub use types::*;
