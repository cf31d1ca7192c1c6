//! Bridge lifecycle: finalize, start, shutdown.

mod runtime;
mod types;


pub use runtime::TesterRuntime;
pub use types::{LifecycleViolation, RuntimeState, SetupError, StreamTester};
