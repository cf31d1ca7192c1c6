//! NDJSON envelope codec for sink to listener traffic.
//!
//! One envelope per line: `{"tester_id": 3, "tuple": {...}}`. The listener
//! only ever sees decoded `(TesterId, Tuple)` pairs.

mod codec;
mod types;

pub use codec::{decode_line, encode_line};
pub use types::*;
