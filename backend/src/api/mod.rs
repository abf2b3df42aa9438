//! HTTP API module.
//!
//! The HTTP server, its response types and the log broadcaster the whole
//! crate reports progress through.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
