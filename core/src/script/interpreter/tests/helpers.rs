//! Test helpers for interpreter tests
//!
//! Transpile with the bundled compiler, run against a captured console

use crate::compiler::{Compiler, CompilerOptions, ScriptTarget};
use crate::sandbox::CapturedConsole;
use crate::script::interpreter::{Interpreter, Limits};
use crate::script::ScriptCompiler;

/// Output text and the message of an uncaught throw, if any
#[derive(Debug)]
pub struct Outcome {
    pub output: String,
    pub thrown: Option<String>,
}

pub fn run_with(source: &str, options: CompilerOptions) -> Outcome {
    let executable = ScriptCompiler::new()
        .transpile(source, &options)
        .unwrap_or_else(|err| panic!("Transpile failed: {}", err));

    let mut console = CapturedConsole::new();
    let thrown = {
        let mut interpreter = Interpreter::new(&mut console, Limits::default());
        interpreter.run(&executable.program).err().map(|value| {
            interpreter
                .thrown_message(&value)
                .unwrap_or_else(|| "<no message>".to_string())
        })
    };
    Outcome {
        output: console.text(),
        thrown,
    }
}

pub fn run(source: &str) -> Outcome {
    run_with(source, CompilerOptions::default())
}

/// Console output of a snippet that must not throw
pub fn output(source: &str) -> String {
    let outcome = run(source);
    assert_eq!(outcome.thrown, None, "Unexpected throw, output: {}", outcome.output);
    outcome.output
}

/// Message of the error a snippet must throw
pub fn thrown(source: &str) -> String {
    run(source).thrown.expect("Expected the snippet to throw")
}

/// Output in sloppy mode
pub fn sloppy_output(source: &str) -> String {
    let outcome = run_with(
        source,
        CompilerOptions {
            target: ScriptTarget::Es2015,
            strict: false,
        },
    );
    assert_eq!(outcome.thrown, None);
    outcome.output
}
