//! Control flow signals

use super::values::Val;

/// Abrupt completion unwinding through the evaluator
///
/// Loops consume `Break`/`Continue`, calls consume `Return`, `try` consumes
/// `Throw`, and the enclosing optional chain consumes `ShortCircuit`.
#[derive(Debug, Clone)]
pub enum Control {
    Break,
    Continue,
    Return(Val),
    Throw(Val),
    ShortCircuit,
}

pub type EvalResult<T = Val> = Result<T, Control>;
