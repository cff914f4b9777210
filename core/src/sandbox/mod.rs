//! Sandboxed evaluation of transpiled snippets
//!
//! A run gets a fresh interpreter whose only outside capability is a
//! [`ConsoleSink`]. [`SandboxEvaluator`] executes it on a dedicated thread so
//! deep recursion has room before the call-depth limit trips.

use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::compiler::Executable;
use crate::script::ast::Program;
use crate::script::interpreter::{Interpreter, Limits, DEFAULT_MAX_CALL_DEPTH};

/// Message used when a thrown value carries no string `message`
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Default stack for the evaluation thread, in MiB
pub const DEFAULT_STACK_SIZE_MB: usize = 256;

/* ===================== Console ===================== */

/// Logging capability handed to a running snippet
///
/// Arguments arrive already formatted; one call is one output line.
pub trait ConsoleSink: Send {
    fn log(&mut self, args: &[String]);

    fn error(&mut self, args: &[String]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Log,
    Error,
}

/// One captured console line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub kind: OutputKind,
    pub text: String,
}

impl OutputLine {
    pub fn log(text: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Log,
            text: text.into(),
        }
    }

    /// An error line; `text` is shown after the `Error: ` marker
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Error,
            text: text.into(),
        }
    }

    /// The line as displayed in the output area
    pub fn render(&self) -> String {
        match self.kind {
            OutputKind::Log => self.text.clone(),
            OutputKind::Error => format!("Error: {}", self.text),
        }
    }
}

/// In-memory console that keeps every line in call order
#[derive(Debug, Default, Clone)]
pub struct CapturedConsole {
    lines: Vec<OutputLine>,
}

impl CapturedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn push(&mut self, line: OutputLine) {
        self.lines.push(line);
    }

    pub fn into_lines(self) -> Vec<OutputLine> {
        self.lines
    }

    /// Rendered lines joined with newlines
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(OutputLine::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ConsoleSink for CapturedConsole {
    fn log(&mut self, args: &[String]) {
        self.lines.push(OutputLine::log(args.join(" ")));
    }

    fn error(&mut self, args: &[String]) {
        self.lines.push(OutputLine::error(args.join(" ")));
    }
}

/* ===================== Evaluator ===================== */

/// An exception escaped the snippet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes transpiled snippets against a console
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        executable: &Executable,
        console: &mut dyn ConsoleSink,
    ) -> Result<(), EvaluationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    pub max_call_depth: usize,
    pub stack_size_mb: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            stack_size_mb: DEFAULT_STACK_SIZE_MB,
        }
    }
}

/// The default evaluator: the tree-walking interpreter on its own thread
#[derive(Debug, Default, Clone)]
pub struct SandboxEvaluator {
    limits: SandboxLimits,
}

impl SandboxEvaluator {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }
}

impl Evaluator for SandboxEvaluator {
    fn evaluate(
        &self,
        executable: &Executable,
        console: &mut dyn ConsoleSink,
    ) -> Result<(), EvaluationError> {
        let limits = Limits {
            max_call_depth: self.limits.max_call_depth,
        };
        let program = &executable.program;

        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("snippet-eval".to_string())
                .stack_size(self.limits.stack_size_mb.max(1) * 1024 * 1024)
                .spawn_scoped(scope, move || run_program(program, console, limits));
            match spawned {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(EvaluationError::new("Evaluation aborted"))),
                Err(err) => {
                    warn!(error = %err, "Could not spawn evaluation thread");
                    Err(EvaluationError::new(format!(
                        "Could not start evaluation: {}",
                        err
                    )))
                }
            }
        })
    }
}

fn run_program(
    program: &Program,
    console: &mut dyn ConsoleSink,
    limits: Limits,
) -> Result<(), EvaluationError> {
    let mut interpreter = Interpreter::new(console, limits);
    interpreter.run(program).map_err(|thrown| {
        let message = interpreter
            .thrown_message(&thrown)
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        debug!(%message, "Snippet threw");
        EvaluationError { message }
    })
}
