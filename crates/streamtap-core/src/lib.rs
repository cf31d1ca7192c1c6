//! streamtap Core Library
//!
//! Shared functionality for streamtap components:
//! - NDJSON envelope codec for sink to listener traffic
//! - Stream schema model and parser
//! - Configuration resolution
//! - Common error types

pub mod config;
pub mod envelope;
pub mod error;
pub mod schema;
pub mod tracing_init;

pub use config::BridgeConfig;
pub use envelope::{Envelope, TesterId, Tuple};
pub use error::{Error, Result};
pub use schema::Schema;
