//! HTTP API module.
//!
//! This module provides the HTTP server, request/response types and the log
//! broadcaster shared with the pipeline.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::start_server;
pub use types::*;
