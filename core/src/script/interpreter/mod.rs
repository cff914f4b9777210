//! Tree-walking interpreter for lowered snippet programs
//!
//! The interpreter owns one object [`Heap`](values::Heap) and one global scope
//! per evaluation. Statements and expressions return
//! [`EvalResult`], with abrupt completions carried as [`Control`] signals.
//! The only capability reachable from a program is the console it was given.

pub mod control;
mod expressions;
mod functions;
mod objects;
pub mod realm;
pub mod scope;
mod statements;
pub mod stdlib;
pub mod values;

#[cfg(test)]
mod tests;

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::sandbox::ConsoleSink;
use crate::script::ast::Program;

pub use control::{Control, EvalResult};
pub use realm::ErrorKind;
pub use values::{ObjId, Val};

use realm::Realm;
use scope::{FuncFrame, Scope, ScopeRef};
use values::{Heap, Prop};

/// Default nesting limit for script function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Resource limits of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/* ===================== Interpreter ===================== */

pub struct Interpreter<'c> {
    heap: Heap,
    realm: Realm,
    global: ScopeRef,
    console: &'c mut dyn ConsoleSink,
    limits: Limits,
    depth: usize,
    /// Arrays currently being joined; a cycle joins as ""
    joining: Vec<ObjId>,
    strict: bool,
    rng: u64,
}

impl<'c> Interpreter<'c> {
    /// Fresh realm whose only outside capability is `console`
    pub fn new(console: &'c mut dyn ConsoleSink, limits: Limits) -> Self {
        let mut heap = Heap::default();
        let global = Scope::root(FuncFrame::default());
        let realm = Realm::bootstrap(&mut heap, &global);

        // Top-level `this` is an empty object, as in a CommonJS module
        let this = heap.alloc(values::HeapObj::plain(Some(realm.object_proto)));
        if let Some(frame) = global.borrow_mut().frame.as_mut() {
            frame.this = Some(Val::Obj(this));
        }

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0x2545_f491_4f6c_dd1d);

        Self {
            heap,
            realm,
            global,
            console,
            limits,
            depth: 0,
            joining: Vec::new(),
            strict: true,
            rng: seed | 1,
        }
    }

    /// Run a program to completion
    ///
    /// Returns the thrown value when the program ends with an uncaught exception.
    pub fn run(&mut self, program: &Program) -> Result<(), Val> {
        self.strict = program.strict;
        let global = self.global.clone();
        self.hoist_declarations(&program.body, &global);

        let outcome = self.exec_statements(&program.body, &global);
        trace!(objects = self.heap.len(), "Program finished");
        match outcome {
            Err(Control::Throw(value)) => Err(value),
            // Top-level `return` simply ends the program
            Ok(()) | Err(_) => Ok(()),
        }
    }

    /// `message` of a thrown value, when it is a string
    pub fn thrown_message(&self, thrown: &Val) -> Option<String> {
        let Val::Obj(start) = thrown else {
            return None;
        };
        let mut current = Some(*start);
        while let Some(id) = current {
            let obj = self.heap.get(id);
            match obj.props.get("message") {
                Some(Prop::Data {
                    value: Val::Str(text),
                    ..
                }) => return Some(text.to_string()),
                Some(_) => return None,
                None => current = obj.proto,
            }
        }
        None
    }

    /* ===================== Errors ===================== */

    /// New error object of the given built-in type
    pub(crate) fn make_error(&mut self, kind: ErrorKind, message: impl Into<String>) -> Val {
        let proto = self.realm.error_proto(kind);
        let id = self.alloc_plain(Some(proto));
        self.heap
            .define(id, "message", Prop::hidden(Val::string(message.into())));
        Val::Obj(id)
    }

    pub(crate) fn throw<T>(&mut self, kind: ErrorKind, message: impl Into<String>) -> EvalResult<T> {
        Err(Control::Throw(self.make_error(kind, message)))
    }

    /// xorshift64*, enough for `Math.random`
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.rng;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng = x;
        let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}
