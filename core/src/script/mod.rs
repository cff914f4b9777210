//! Snippet script language
//!
//! [`ScriptCompiler`] is the bundled [`Compiler`]: it parses TypeScript-flavoured
//! snippets with the pest grammar, erases types, lowers TypeScript-only
//! constructs and runs early-error validation. The [`interpreter`] evaluates
//! the resulting program.

pub mod ast;
pub mod interpreter;
pub mod number;
pub mod parser;

use tracing::debug;

use crate::compiler::{Compiler, CompilerOptions, Diagnostic, Executable, TranspileFailure};
use ast::Program;

/// Compiler name reported by [`ScriptCompiler`]
pub const COMPILER_NAME: &str = "snippet-script";

/// Version of the bundled compiler
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The bundled snippet compiler
#[derive(Debug, Default, Clone)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for ScriptCompiler {
    fn name(&self) -> &str {
        COMPILER_NAME
    }

    fn version(&self) -> &str {
        COMPILER_VERSION
    }

    fn transpile(
        &self,
        source: &str,
        options: &CompilerOptions,
    ) -> Result<Executable, TranspileFailure> {
        let body = parser::parse_program(source, options.target)?;

        parser::semantic_validator::validate_program(&body, options.strict)
            .map_err(|err| Diagnostic::new(err.to_string()))?;

        debug!(
            statements = body.len(),
            target = %options.target,
            "Transpiled snippet"
        );

        Ok(Executable {
            program: Program {
                body,
                strict: options.strict,
            },
            options: *options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ScriptTarget;

    #[test]
    fn test_transpile_reports_name_and_version() {
        let compiler = ScriptCompiler::new();
        assert_eq!(compiler.name(), "snippet-script");
        assert_eq!(compiler.version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_transpile_carries_options() {
        let options = CompilerOptions {
            target: ScriptTarget::EsNext,
            strict: false,
        };
        let executable = ScriptCompiler::new()
            .transpile("let a = 1;", &options)
            .expect("Should transpile");
        assert_eq!(executable.options, options);
        assert!(!executable.program.strict);
        assert_eq!(executable.program.body.len(), 1);
    }

    #[test]
    fn test_transpile_failure_from_validation() {
        let failure = ScriptCompiler::new()
            .transpile("let a = 1; let a = 2;", &CompilerOptions::default())
            .unwrap_err();
        assert_eq!(
            failure.to_string(),
            "Identifier 'a' has already been declared"
        );
    }

    #[test]
    fn test_transpile_failure_from_syntax() {
        let failure = ScriptCompiler::new()
            .transpile("let = ;", &CompilerOptions::default())
            .unwrap_err();
        assert_eq!(failure.diagnostics.len(), 1);
        assert!(failure.diagnostics[0].position.is_some());
    }
}
