//! Playground controller
//!
//! One [`Playground`] per widget. It owns the widget's mode, the editable
//! snippet, the run lifecycle and the last [`RunResult`]. Methods take
//! `&self` so a host can hold the widget behind an `Arc` and fire events at
//! it from anywhere; a run requested while another is outstanding is refused.
//!
//! Failures never escape: load and transpile failures replace the output
//! with a terminal message, while an exception thrown by the snippet is
//! appended after whatever it logged first.

pub mod clipboard;


use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::block::{PresentationMeta, RenderedBlock};
use crate::compiler::{CompilerLoader, CompilerOptions, Executable};
use crate::config::Config;
use crate::sandbox::{CapturedConsole, Evaluator, OutputLine, SandboxEvaluator};

pub use clipboard::{Clipboard, ClipboardError, MemoryClipboard, NoClipboard, StdoutClipboard};

/* ===================== States ===================== */

/// Which source the widget treats as authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetMode {
    Display,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    /// Compiler being fetched or a run in progress
    Loading,
    Ready,
}

/// Output of one run attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub lines: Vec<OutputLine>,
    /// Load or transpile failure; replaces any output
    pub failure: Option<String>,
}

impl RunResult {
    pub fn completed(lines: Vec<OutputLine>) -> Self {
        Self {
            lines,
            failure: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            lines: Vec::new(),
            failure: Some(message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// The text shown in the output area
    pub fn text(&self) -> String {
        match &self.failure {
            Some(message) => format!("Error: {}", message),
            None => self
                .lines
                .iter()
                .map(OutputLine::render)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Outcome of a run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunAttempt {
    /// Another run is outstanding; nothing was started
    Busy,
    Completed(RunResult),
}

impl RunAttempt {
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            RunAttempt::Busy => None,
            RunAttempt::Completed(result) => Some(result),
        }
    }

    pub fn into_result(self) -> Option<RunResult> {
        match self {
            RunAttempt::Busy => None,
            RunAttempt::Completed(result) => Some(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaygroundError {
    #[error("Snippet can only be edited in edit mode")]
    NotEditing,
}

/// What the host renders for a widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetView {
    pub id: Uuid,
    pub mode: WidgetMode,
    pub source: String,
    /// Label of the edit toggle
    pub edit_label: &'static str,
    pub run_enabled: bool,
    pub copy_enabled: bool,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub keep_background: bool,
    pub output: Option<String>,
}

/* ===================== Runtime ===================== */

/// Collaborators shared by widgets
#[derive(Clone)]
pub struct PlaygroundRuntime {
    pub loader: Arc<CompilerLoader>,
    pub evaluator: Arc<dyn Evaluator>,
    pub options: CompilerOptions,
    pub clipboard: Arc<dyn Clipboard>,
}

impl PlaygroundRuntime {
    pub fn new(loader: Arc<CompilerLoader>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            loader,
            evaluator,
            options: CompilerOptions::default(),
            clipboard: Arc::new(MemoryClipboard::new()),
        }
    }

    /// Runtime backed by the process-wide loader and configured limits
    pub fn from_config(config: &Config) -> Self {
        Self {
            loader: CompilerLoader::global(),
            evaluator: Arc::new(SandboxEvaluator::new(config.sandbox.limits())),
            options: config.compiler.options(),
            clipboard: Arc::new(MemoryClipboard::new()),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }
}

impl Default for PlaygroundRuntime {
    fn default() -> Self {
        Self::new(CompilerLoader::global(), Arc::new(SandboxEvaluator::default()))
    }
}

impl std::fmt::Debug for PlaygroundRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaygroundRuntime")
            .field("loader", &self.loader)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/* ===================== Widget ===================== */

#[derive(Debug)]
struct WidgetState {
    mode: WidgetMode,
    /// Set by the first Display→Edit snapshot
    snippet: Option<String>,
    /// The snippet has been replaced through `edit`
    edited: bool,
    status: RunStatus,
    last_result: Option<RunResult>,
}

/// One interactive code block
#[derive(Debug)]
pub struct Playground {
    id: Uuid,
    block: RenderedBlock,
    /// Text content of the block, captured at mount
    rendered: String,
    meta: PresentationMeta,
    runtime: PlaygroundRuntime,
    state: Mutex<WidgetState>,
}

impl Playground {
    /// Mount a widget on a rendered block
    pub fn new(block: RenderedBlock, meta: PresentationMeta, runtime: PlaygroundRuntime) -> Self {
        let id = Uuid::new_v4();
        let rendered = block.text_content();
        debug!(widget = %id, title = ?meta.title, "Mounted playground");

        Self {
            id,
            block,
            rendered,
            meta,
            runtime,
            state: Mutex::new(WidgetState {
                mode: WidgetMode::Display,
                snippet: None,
                edited: false,
                status: RunStatus::Idle,
                last_result: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn block(&self) -> &RenderedBlock {
        &self.block
    }

    pub fn meta(&self) -> &PresentationMeta {
        &self.meta
    }

    pub fn mode(&self) -> WidgetMode {
        self.state.lock().mode
    }

    pub fn status(&self) -> RunStatus {
        self.state.lock().status
    }

    /// The editable snippet, once an edit session has started
    pub fn snippet(&self) -> Option<String> {
        self.state.lock().snippet.clone()
    }

    pub fn last_result(&self) -> Option<RunResult> {
        self.state.lock().last_result.clone()
    }

    /// Flip between display and edit mode
    ///
    /// Entering edit mode snapshots the displayed source into the snippet.
    /// Leaving it keeps the snippet as the authoritative source.
    pub fn toggle_edit(&self) -> WidgetMode {
        let mut state = self.state.lock();
        state.mode = match state.mode {
            WidgetMode::Display => {
                let displayed = state
                    .snippet
                    .clone()
                    .unwrap_or_else(|| self.rendered.clone());
                state.snippet = Some(displayed);
                WidgetMode::Edit
            }
            WidgetMode::Edit => WidgetMode::Display,
        };
        debug!(widget = %self.id, mode = ?state.mode, "Toggled edit mode");
        state.mode
    }

    /// Replace the snippet with the text area's contents
    pub fn edit(&self, text: impl Into<String>) -> Result<(), PlaygroundError> {
        let mut state = self.state.lock();
        if state.mode != WidgetMode::Edit {
            return Err(PlaygroundError::NotEditing);
        }
        state.snippet = Some(text.into());
        state.edited = true;
        Ok(())
    }

    /// Source a run would execute right now
    pub fn current_source(&self) -> String {
        let state = self.state.lock();
        state
            .snippet
            .clone()
            .unwrap_or_else(|| self.rendered.clone())
    }

    /// Load, transpile and evaluate the current source
    ///
    /// Returns [`RunAttempt::Busy`] without touching the last result when a
    /// run is already outstanding on this widget.
    pub async fn run(&self) -> RunAttempt {
        let previous = {
            let mut state = self.state.lock();
            if state.status == RunStatus::Loading {
                debug!(widget = %self.id, "Run ignored, another run is outstanding");
                return RunAttempt::Busy;
            }
            std::mem::replace(&mut state.status, RunStatus::Loading)
        };
        let mut guard = LoadingGuard {
            state: &self.state,
            previous,
            armed: true,
        };

        let span = info_span!("run", widget = %self.id);
        let result = self.execute().instrument(span).await;
        guard.armed = false;

        let mut state = self.state.lock();
        state.last_result = Some(result.clone());
        state.status = RunStatus::Ready;
        RunAttempt::Completed(result)
    }

    async fn execute(&self) -> RunResult {
        let compiler = match self.runtime.loader.ensure_loaded().await {
            Ok(compiler) => compiler,
            Err(failure) => {
                info!(error = %failure, "Run stopped, compiler unavailable");
                return RunResult::failed(failure.to_string());
            }
        };

        let source = self.current_source();
        let executable = match compiler.transpile(&source, &self.runtime.options) {
            Ok(executable) => executable,
            Err(failure) => {
                for diagnostic in &failure.diagnostics {
                    debug!(%diagnostic, "Transpile diagnostic");
                }
                return RunResult::failed(failure.to_string());
            }
        };

        let result = evaluate(self.runtime.evaluator.clone(), executable).await;
        info!(
            lines = result.lines.len(),
            failed = result.is_failure(),
            "Run finished"
        );
        result
    }

    /// Send the displayed source to the clipboard
    ///
    /// Decorations are dropped. Returns the copied text, or `None` when the
    /// widget does not allow copying. A failed clipboard write is ignored.
    pub fn copy(&self) -> Option<String> {
        if !self.meta.allow_copy {
            return None;
        }
        let text = {
            let state = self.state.lock();
            match &state.snippet {
                Some(snippet) if state.edited => snippet.clone(),
                _ => self.block.copy_text(),
            }
        };
        if let Err(err) = self.runtime.clipboard.write_text(&text) {
            debug!(widget = %self.id, error = %err, "Copy failed");
        }
        Some(text)
    }

    /// Snapshot for rendering
    pub fn view(&self) -> WidgetView {
        let state = self.state.lock();
        let source = state
            .snippet
            .clone()
            .unwrap_or_else(|| self.rendered.clone());
        let output = state
            .last_result
            .as_ref()
            .map(RunResult::text)
            .filter(|text| !text.is_empty());

        WidgetView {
            id: self.id,
            mode: state.mode,
            source,
            edit_label: match state.mode {
                WidgetMode::Display => "Edit",
                WidgetMode::Edit => "Save",
            },
            run_enabled: state.status != RunStatus::Loading,
            copy_enabled: self.meta.allow_copy,
            title: self.meta.title.clone(),
            icon: self.meta.icon.clone(),
            keep_background: self.meta.keep_background,
            output,
        }
    }
}

/// Evaluate off the async executor with a fresh capturing console
async fn evaluate(evaluator: Arc<dyn Evaluator>, executable: Executable) -> RunResult {
    let evaluation = tokio::task::spawn_blocking(move || {
        let mut console = CapturedConsole::new();
        let outcome = evaluator.evaluate(&executable, &mut console);
        (console, outcome)
    })
    .await;

    match evaluation {
        Ok((console, outcome)) => {
            let mut lines = console.into_lines();
            if let Err(err) = outcome {
                lines.push(OutputLine::error(err.message));
            }
            RunResult::completed(lines)
        }
        Err(err) => RunResult::failed(format!("Evaluation aborted: {}", err)),
    }
}

/// Restores the pre-run status when a run future is dropped mid-flight
struct LoadingGuard<'a> {
    state: &'a Mutex<WidgetState>,
    previous: RunStatus,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().status = self.previous;
        }
    }
}
