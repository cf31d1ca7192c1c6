//! Tester id correlation.

mod correlation;

pub use correlation::{CorrelationRegistry, RegistryError};
