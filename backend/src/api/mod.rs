//! HTTP API module.
//!
//! The HTTP server, its request/response types, and the run log shared with
//! the CLI.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
