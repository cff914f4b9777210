//! Compiler capability
//!
//! A compiler turns snippet source into an [`Executable`]. The capability is
//! obtained through the [`loader`] once per process and shared read-only by
//! every widget.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::script::ast::Program;

pub use loader::{BundledSource, CompilerLoader, CompilerSource, LoadFailure};

/* ===================== Options ===================== */

/// Language level the emitted program is lowered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    Es2015,
    Es2016,
    EsNext,
}

impl Default for ScriptTarget {
    fn default() -> Self {
        ScriptTarget::Es2015
    }
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptTarget::Es2015 => write!(f, "es2015"),
            ScriptTarget::Es2016 => write!(f, "es2016"),
            ScriptTarget::EsNext => write!(f, "esnext"),
        }
    }
}

/// Options passed to [`Compiler::transpile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    pub target: ScriptTarget,
    pub strict: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: ScriptTarget::Es2015,
            strict: true,
        }
    }
}

/* ===================== Output ===================== */

/// Directly executable form of a snippet
#[derive(Debug, Clone, PartialEq)]
pub struct Executable {
    pub program: Program,
    pub options: CompilerOptions,
}

/// Source position, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A fatal compiler diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub position: Option<Position>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    pub fn at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            position: Some(Position { line, column }),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(Position { line, column }) => write!(f, "{} ({}:{})", self.message, line, column),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Source could not be turned into an executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for TranspileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnostics.first() {
            Some(first) => write!(f, "{}", first),
            None => write!(f, "transpilation failed"),
        }
    }
}

impl std::error::Error for TranspileFailure {}

impl From<Diagnostic> for TranspileFailure {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}

/* ===================== Capability ===================== */

/// Source-to-executable transpiler
pub trait Compiler: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn transpile(&self, source: &str, options: &CompilerOptions) -> Result<Executable, TranspileFailure>;
}

impl fmt::Debug for dyn Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name(), self.version())
    }
}
