//! Line encoding and decoding.
//!
//! Tolerant reader: unknown fields are ignored, missing or mistyped required
//! fields are errors.

use serde::Serialize;
use serde_json::Value;

use super::types::{Envelope, TesterId, Tuple};
use crate::error::{Error, Result};

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    tester_id: TesterId,
    tuple: &'a Tuple,
}

/// Encode one envelope as a single JSON line, without the trailing newline.
pub fn encode_line(tester_id: TesterId, tuple: &Tuple) -> Result<String> {
    Ok(serde_json::to_string(&EnvelopeRef { tester_id, tuple })?)
}

/// Decode one line into an envelope.
///
/// `max_len` bounds the accepted line length in bytes.
pub fn decode_line(line: &str, max_len: usize) -> Result<Envelope> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.len() > max_len {
        return Err(Error::EnvelopeTooLarge {
            len: line.len(),
            max: max_len,
        });
    }
    if line.trim().is_empty() {
        return Err(Error::EnvelopeDecode("Empty line".into()));
    }

    let raw: Value = serde_json::from_str(line)?;
    let obj = raw
        .as_object()
        .ok_or_else(|| Error::EnvelopeDecode("Envelope is not a JSON object".into()))?;

    let tester_id = obj
        .get("tester_id")
        .ok_or_else(|| Error::EnvelopeDecode("Missing 'tester_id' field".into()))?
        .as_u64()
        .ok_or_else(|| Error::EnvelopeDecode("'tester_id' is not a non-negative integer".into()))?;
    let tester_id = TesterId::try_from(tester_id)
        .map_err(|_| Error::EnvelopeDecode(format!("'tester_id' {tester_id} out of range")))?;

    let tuple = obj
        .get("tuple")
        .cloned()
        .ok_or_else(|| Error::EnvelopeDecode("Missing 'tuple' field".into()))?;

    Ok(Envelope::new(tester_id, Tuple::new(tuple)))
}
