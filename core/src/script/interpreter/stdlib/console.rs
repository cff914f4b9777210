//! `console.log` / `console.error`
//!
//! Objects, arrays and `null` are printed as two-space indented JSON; every
//! other value goes through `String()`.

use super::super::control::EvalResult;
use super::super::values::Val;
use super::super::Interpreter;

/// Console methods reachable from scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMethod {
    Log,
    Error,
}

impl<'c> Interpreter<'c> {
    pub(crate) fn console_method(&mut self, method: ConsoleMethod, args: Vec<Val>) -> EvalResult {
        let mut parts = Vec::with_capacity(args.len());
        for value in &args {
            parts.push(self.format_console_arg(value)?);
        }
        match method {
            ConsoleMethod::Log => self.console.log(&parts),
            ConsoleMethod::Error => self.console.error(&parts),
        }
        Ok(Val::Undefined)
    }

    /// Render one console argument
    pub(crate) fn format_console_arg(&mut self, value: &Val) -> EvalResult<String> {
        match value {
            Val::Null => Ok("null".to_string()),
            Val::Obj(_) if !self.is_callable(value) => Ok(self
                .stringify(value, Some("  "))?
                .unwrap_or_else(|| "undefined".to_string())),
            other => self.to_string_lossy(other),
        }
    }
}
