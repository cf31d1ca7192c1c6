//! Stream schemas.
//!
//! Every observed stream carries a tuple schema such as
//! `tuple<int32 id, list<rstring> tags, map<rstring, float64> scores>`.
//! Relay nodes declare the same schema on their input and output ports.

mod parser;
mod types;

pub use parser::{MAX_NESTING, parse_schema};
pub use types::*;
