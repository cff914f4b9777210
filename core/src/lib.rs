//! Interactive code block runtime
//!
//! A [`controller::Playground`] displays a snippet, lets the user edit it,
//! transpiles it with the compiler obtained through the process-wide
//! [`compiler::CompilerLoader`], evaluates it in the [`sandbox`] and keeps
//! the captured console output.

pub mod block;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod controller;
pub mod sandbox;
pub mod script;

// Re-export the widget API for convenience
pub use block::{PresentationMeta, RenderedBlock, Segment};
pub use compiler::{CompilerLoader, CompilerOptions, LoadFailure, ScriptTarget, TranspileFailure};
pub use config::Config;
pub use controller::{Playground, PlaygroundRuntime, RunAttempt, RunResult, RunStatus, WidgetMode};
pub use sandbox::{EvaluationError, OutputLine, SandboxEvaluator};
