//! Standard library function implementations
//!
//! Every built-in function is a [`Native`] identifier stored in a function
//! object; calls route through [`Interpreter::call_native`]. The tables in
//! each submodule list the property name every method is installed under.

pub mod array;
pub mod collections;
pub mod console;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod string;

use super::control::EvalResult;
use super::realm::ErrorKind;
use super::values::{ObjId, Val};
use super::Interpreter;

pub use array::ArrayMethod;
pub use collections::{MapMethod, SetMethod};
pub use console::ConsoleMethod;
pub use json::JsonFunc;
pub use math::MathFunc;
pub use number::{BooleanMethod, NumberMethod};
pub use object::{FunctionMethod, ObjectFunc};
pub use string::StringMethod;

/* ===================== Standard Library Function Types ===================== */

/// Built-in constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctor {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Error(ErrorKind),
    Map,
    Set,
}

/// Global functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalFunc {
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    /// `Error.captureStackTrace`: accepted and ignored
    CaptureStackTrace,
    ErrorToString,
}

/// Standard library function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {
    Ctor(Ctor),
    Global(GlobalFunc),
    Console(ConsoleMethod),
    Object(ObjectFunc),
    Function(FunctionMethod),
    Array(ArrayMethod),
    String(StringMethod),
    Number(NumberMethod),
    Boolean(BooleanMethod),
    Math(MathFunc),
    Json(JsonFunc),
    Map(MapMethod),
    Set(SetMethod),
}

impl Native {
    pub fn is_constructor(&self) -> bool {
        matches!(self, Native::Ctor(_))
    }
}

/* ===================== Stdlib Dispatcher ===================== */

impl<'c> Interpreter<'c> {
    /// Call a built-in with its receiver and arguments
    pub(crate) fn call_native(&mut self, native: Native, this: Val, args: Vec<Val>) -> EvalResult {
        match native {
            Native::Ctor(ctor) => self.call_ctor(ctor, args),
            Native::Global(func) => self.call_global(func, this, args),
            Native::Console(method) => self.console_method(method, args),
            Native::Object(func) => self.object_func(func, this, args),
            Native::Function(method) => self.function_method(method, this, args),
            Native::Array(method) => self.array_method(method, this, args),
            Native::String(method) => self.string_method(method, this, args),
            Native::Number(method) => self.number_method(method, this, args),
            Native::Boolean(method) => self.boolean_method(method, this),
            Native::Math(func) => self.math_func(func, args),
            Native::Json(func) => self.json_func(func, args),
            Native::Map(method) => self.map_method(method, this, args),
            Native::Set(method) => self.set_method(method, this, args),
        }
    }

    /// `new` applied to a built-in constructor
    pub(crate) fn construct_native(
        &mut self,
        ctor: Ctor,
        args: Vec<Val>,
        new_target: ObjId,
    ) -> EvalResult {
        match ctor {
            Ctor::Error(kind) => self.construct_error(kind, args, new_target),
            Ctor::Map => self.construct_map(args, new_target),
            Ctor::Set => self.construct_set(args, new_target),
            Ctor::Object => {
                let proto = self.prototype_for(new_target, self.realm.object_proto)?;
                match arg(&args, 0) {
                    value @ Val::Obj(_) if proto == self.realm.object_proto => Ok(value),
                    _ => Ok(Val::Obj(self.alloc_plain(Some(proto)))),
                }
            }
            // No wrapper objects: `new Number(1)` behaves like `Number(1)`
            other => self.call_ctor(other, args),
        }
    }

    fn call_ctor(&mut self, ctor: Ctor, args: Vec<Val>) -> EvalResult {
        match ctor {
            Ctor::Object => match arg(&args, 0) {
                value @ Val::Obj(_) => Ok(value),
                _ => Ok(Val::Obj(self.alloc_object())),
            },
            Ctor::Array => match args.as_slice() {
                [Val::Num(len)] => {
                    if len.fract() != 0.0 || *len < 0.0 || *len > u32::MAX as f64 {
                        return self.throw(ErrorKind::RangeError, "Invalid array length");
                    }
                    Ok(self.alloc_array(vec![Val::Undefined; *len as usize]))
                }
                _ => Ok(self.alloc_array(args)),
            },
            Ctor::String => match args.first() {
                Some(value) => Ok(Val::Str(self.to_str(value)?)),
                None => Ok(Val::string("")),
            },
            Ctor::Number => match args.first() {
                Some(value) => Ok(Val::Num(self.to_number(value)?)),
                None => Ok(Val::Num(0.0)),
            },
            Ctor::Boolean => Ok(Val::Bool(arg(&args, 0).is_truthy())),
            Ctor::Error(kind) => {
                let proto = self.realm.error_proto(kind);
                self.build_error(proto, arg(&args, 0))
            }
            Ctor::Map => self.throw(ErrorKind::TypeError, "Constructor Map requires 'new'"),
            Ctor::Set => self.throw(ErrorKind::TypeError, "Constructor Set requires 'new'"),
        }
    }

    fn call_global(&mut self, func: GlobalFunc, this: Val, args: Vec<Val>) -> EvalResult {
        match func {
            GlobalFunc::ParseInt => {
                let text = self.to_str(&arg(&args, 0))?;
                let radix = match arg(&args, 1) {
                    Val::Undefined => None,
                    value => Some(crate::script::number::to_int32(self.to_number(&value)?) as u32),
                };
                Ok(Val::Num(crate::script::number::parse_int(&text, radix)))
            }
            GlobalFunc::ParseFloat => {
                let text = self.to_str(&arg(&args, 0))?;
                Ok(Val::Num(crate::script::number::parse_float(&text)))
            }
            GlobalFunc::IsNaN => Ok(Val::Bool(self.to_number(&arg(&args, 0))?.is_nan())),
            GlobalFunc::IsFinite => Ok(Val::Bool(self.to_number(&arg(&args, 0))?.is_finite())),
            GlobalFunc::CaptureStackTrace => Ok(Val::Undefined),
            GlobalFunc::ErrorToString => {
                let Val::Obj(id) = this else {
                    return self.throw(
                        ErrorKind::TypeError,
                        "Error.prototype.toString requires that 'this' be an Object",
                    );
                };
                let name = match self.get_from(id, "name", &this)? {
                    Val::Undefined => "Error".into(),
                    value => self.to_str(&value)?,
                };
                let message = match self.get_from(id, "message", &this)? {
                    Val::Undefined => "".into(),
                    value => self.to_str(&value)?,
                };
                Ok(Val::string(match (name.is_empty(), message.is_empty()) {
                    (_, true) => name.to_string(),
                    (true, false) => message.to_string(),
                    (false, false) => format!("{}: {}", name, message),
                }))
            }
        }
    }

    fn construct_error(&mut self, kind: ErrorKind, args: Vec<Val>, new_target: ObjId) -> EvalResult {
        let proto = self.prototype_for(new_target, self.realm.error_proto(kind))?;
        self.build_error(proto, arg(&args, 0))
    }

    fn build_error(&mut self, proto: ObjId, message: Val) -> EvalResult {
        let id = self.alloc_plain(Some(proto));
        if !matches!(message, Val::Undefined) {
            let text = self.to_str(&message)?;
            self.heap
                .define(id, "message", super::values::Prop::hidden(Val::Str(text)));
        }
        Ok(Val::Obj(id))
    }
}

/* ===================== Argument Helpers ===================== */

/// Argument `index`, or `undefined` when absent
pub(crate) fn arg(args: &[Val], index: usize) -> Val {
    args.get(index).cloned().unwrap_or(Val::Undefined)
}

/// Relative index as used by `slice`, `at` and friends
pub(crate) fn relative_index(position: f64, len: usize) -> usize {
    let len_f = len as f64;
    if position.is_nan() {
        0
    } else if position < 0.0 {
        (len_f + position.trunc()).max(0.0) as usize
    } else {
        position.trunc().min(len_f) as usize
    }
}
