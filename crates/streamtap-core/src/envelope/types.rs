//! Envelope and tuple types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier correlating a network message to an observed stream.
pub type TesterId = u32;

/// Opaque tuple data as emitted by the job's sink.
///
/// The relay never inspects it; observers receive exactly what the sink sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuple(Value);

impl Tuple {
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Attribute lookup for object-shaped tuples.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }
}

impl From<Value> for Tuple {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A single decoded message: which tester it is for, and the tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tester_id: TesterId,
    pub tuple: Tuple,
}

impl Envelope {
    pub const fn new(tester_id: TesterId, tuple: Tuple) -> Self {
        Self { tester_id, tuple }
    }
}
