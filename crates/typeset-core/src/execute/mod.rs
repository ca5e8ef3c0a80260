//! Execution control for compile requests.
//!
//! - `AbortHandle` - shared cancellation flag observed by the orchestrator
//! - `CompileCallback` - progress observer for individual compile jobs

mod context;

pub use context::{AbortHandle, CompileCallback};
