//! Expression evaluation

use std::cmp::Ordering;

use super::control::{Control, EvalResult};
use super::objects::Hint;
use super::realm::ErrorKind;
use super::scope::ScopeRef;
use super::statements::BindMode;
use super::values::{strict_equals, FuncKind, Val};
use super::Interpreter;
use crate::script::ast::{
    Arg, AssignOp, BinaryOp, Expr, LogicalOp, ObjectProp, Pattern, PropKey, UnaryOp, UpdateOp,
};
use crate::script::number::{to_int32, to_uint32};

/// Resolved assignment target, evaluated once for compound operators
enum Reference {
    Binding(String),
    Property(Val, String),
}

impl<'c> Interpreter<'c> {
    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult {
        match expr {
            Expr::Num(n) => Ok(Val::Num(*n)),
            Expr::Str(s) => Ok(Val::string(s)),
            Expr::Bool(b) => Ok(Val::Bool(*b)),
            Expr::Null => Ok(Val::Null),
            Expr::Ident(name) => self.lookup(name, scope),
            Expr::This => self.this_value(scope),
            Expr::Super => self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here"),
            Expr::Array(elements) => {
                let items = self.eval_args(elements, scope)?;
                Ok(self.alloc_array(items))
            }
            Expr::Object(props) => self.eval_object(props, scope),
            Expr::Function(def) => {
                let kind = if def.is_arrow {
                    FuncKind::Arrow
                } else {
                    FuncKind::Normal
                };
                Ok(Val::Obj(self.create_function(def, scope, kind, None)))
            }
            Expr::Unary { op, arg } => self.eval_unary(*op, arg, scope),
            Expr::Update { op, prefix, target } => {
                let reference = self.reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let old = self.to_number(&old)?;
                let new = match op {
                    UpdateOp::Inc => old + 1.0,
                    UpdateOp::Dec => old - 1.0,
                };
                self.put_reference(&reference, Val::Num(new), scope)?;
                Ok(Val::Num(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                if short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Expr::Cond { test, cons, alt } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(cons, scope)
                } else {
                    self.eval(alt, scope)
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            Expr::New { callee, args } => {
                let ctor = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                match ctor {
                    Val::Obj(id) if self.is_constructor(&ctor) => self.construct(&ctor, args, id),
                    _ => self.throw(
                        ErrorKind::TypeError,
                        format!("{} is not a constructor", describe(callee)),
                    ),
                }
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                if let Expr::Super = object.as_ref() {
                    return self.super_get(property, scope);
                }
                let target = self.eval(object, scope)?;
                if *optional && target.is_nullish() {
                    return Err(Control::ShortCircuit);
                }
                self.get(&target, property)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                if let Expr::Super = object.as_ref() {
                    let key = self.eval(index, scope)?;
                    let key = self.to_property_key(&key)?;
                    return self.super_get(&key, scope);
                }
                let target = self.eval(object, scope)?;
                if *optional && target.is_nullish() {
                    return Err(Control::ShortCircuit);
                }
                let key = self.eval(index, scope)?;
                self.get_computed(&target, &key)
            }
            Expr::OptionalChain(inner) => match self.eval(inner, scope) {
                Err(Control::ShortCircuit) => Ok(Val::Undefined),
                other => other,
            },
            Expr::Seq(exprs) => {
                let mut last = Val::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    /// Arguments or array elements, expanding spreads
    pub(crate) fn eval_args(&mut self, args: &[Arg], scope: &ScopeRef) -> EvalResult<Vec<Val>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Plain(expr) => values.push(self.eval(expr, scope)?),
                Arg::Spread(expr) => {
                    let spread = self.eval(expr, scope)?;
                    values.extend(self.iterate(&spread)?);
                }
            }
        }
        Ok(values)
    }

    pub(crate) fn prop_key(&mut self, key: &PropKey, scope: &ScopeRef) -> EvalResult<String> {
        match key {
            PropKey::Named(name) => Ok(name.clone()),
            PropKey::Computed(expr) => {
                let key = self.eval(expr, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn eval_object(&mut self, props: &[ObjectProp], scope: &ScopeRef) -> EvalResult {
        let id = self.alloc_object();
        let target = Val::Obj(id);
        for prop in props {
            match prop {
                ObjectProp::KeyValue(key, expr) => {
                    let key = self.prop_key(key, scope)?;
                    let value = self.eval(expr, scope)?;
                    if let Expr::Function(_) = expr {
                        self.infer_name(&value, &key);
                    }
                    self.heap
                        .define(id, key, super::values::Prop::data(value));
                }
                ObjectProp::Spread(expr) => {
                    let source = self.eval(expr, scope)?;
                    self.copy_properties(id, &source)?;
                }
                ObjectProp::CoverInit { .. } => {
                    return self.throw(
                        ErrorKind::SyntaxError,
                        "Invalid shorthand property initializer",
                    );
                }
            }
        }
        Ok(target)
    }

    /* ===================== Operators ===================== */

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &ScopeRef) -> EvalResult {
        match op {
            UnaryOp::TypeOf => {
                if let Expr::Ident(name) = arg {
                    if !self.is_declared(name, scope) && name != "arguments" {
                        return Ok(Val::string("undefined"));
                    }
                }
                let value = self.eval(arg, scope)?;
                Ok(Val::string(self.type_of(&value)))
            }
            UnaryOp::Delete => match arg {
                Expr::Member {
                    object, property, ..
                } => {
                    let target = self.eval(object, scope)?;
                    Ok(Val::Bool(self.delete_property(&target, property)?))
                }
                Expr::Index { object, index, .. } => {
                    let target = self.eval(object, scope)?;
                    let key = self.eval(index, scope)?;
                    let key = self.to_property_key(&key)?;
                    Ok(Val::Bool(self.delete_property(&target, &key)?))
                }
                Expr::OptionalChain(inner) => match self.eval_unary(op, inner, scope) {
                    Err(Control::ShortCircuit) => Ok(Val::Bool(true)),
                    other => other,
                },
                Expr::Ident(_) => Ok(Val::Bool(false)),
                other => {
                    self.eval(other, scope)?;
                    Ok(Val::Bool(true))
                }
            },
            UnaryOp::Void => {
                self.eval(arg, scope)?;
                Ok(Val::Undefined)
            }
            UnaryOp::Not => Ok(Val::Bool(!self.eval(arg, scope)?.is_truthy())),
            UnaryOp::Neg => {
                let value = self.eval(arg, scope)?;
                Ok(Val::Num(-self.to_number(&value)?))
            }
            UnaryOp::Plus => {
                let value = self.eval(arg, scope)?;
                Ok(Val::Num(self.to_number(&value)?))
            }
            UnaryOp::BitNot => {
                let value = self.eval(arg, scope)?;
                Ok(Val::Num(!to_int32(self.to_number(&value)?) as f64))
            }
        }
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, left: &Val, right: &Val) -> EvalResult {
        let value = match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Val::Str(_)) || matches!(right, Val::Str(_)) {
                    let mut text = self.to_string_lossy(&left)?;
                    text.push_str(&self.to_str(&right)?);
                    Val::string(text)
                } else {
                    Val::Num(self.to_number(&left)? + self.to_number(&right)?)
                }
            }
            BinaryOp::Sub => Val::Num(self.to_number(left)? - self.to_number(right)?),
            BinaryOp::Mul => Val::Num(self.to_number(left)? * self.to_number(right)?),
            BinaryOp::Div => Val::Num(self.to_number(left)? / self.to_number(right)?),
            BinaryOp::Rem => Val::Num(self.to_number(left)? % self.to_number(right)?),
            BinaryOp::Pow => Val::Num(pow(self.to_number(left)?, self.to_number(right)?)),
            BinaryOp::Eq => Val::Bool(self.loose_equals(left, right)?),
            BinaryOp::NotEq => Val::Bool(!self.loose_equals(left, right)?),
            BinaryOp::StrictEq => Val::Bool(strict_equals(left, right)),
            BinaryOp::StrictNotEq => Val::Bool(!strict_equals(left, right)),
            BinaryOp::Lt => Val::Bool(self.compare(left, right)? == Some(Ordering::Less)),
            BinaryOp::Gt => Val::Bool(self.compare(left, right)? == Some(Ordering::Greater)),
            BinaryOp::LtEq => Val::Bool(matches!(
                self.compare(left, right)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::GtEq => Val::Bool(matches!(
                self.compare(left, right)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::BitAnd => {
                Val::Num((to_int32(self.to_number(left)?) & to_int32(self.to_number(right)?)) as f64)
            }
            BinaryOp::BitOr => {
                Val::Num((to_int32(self.to_number(left)?) | to_int32(self.to_number(right)?)) as f64)
            }
            BinaryOp::BitXor => {
                Val::Num((to_int32(self.to_number(left)?) ^ to_int32(self.to_number(right)?)) as f64)
            }
            BinaryOp::Shl => {
                let count = to_uint32(self.to_number(right)?) & 31;
                Val::Num(to_int32(self.to_number(left)?).wrapping_shl(count) as f64)
            }
            BinaryOp::Shr => {
                let count = to_uint32(self.to_number(right)?) & 31;
                Val::Num((to_int32(self.to_number(left)?) >> count) as f64)
            }
            BinaryOp::UShr => {
                let count = to_uint32(self.to_number(right)?) & 31;
                Val::Num((to_uint32(self.to_number(left)?) >> count) as f64)
            }
            BinaryOp::InstanceOf => Val::Bool(self.instance_of(left, right)?),
            BinaryOp::In => {
                let Val::Obj(id) = right else {
                    let key = self.to_string_lossy(left)?;
                    let description = self.describe_value(right);
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("Cannot use 'in' operator to search for '{}' in {}", key, description),
                    );
                };
                let key = self.to_property_key(left)?;
                Val::Bool(self.has_property(*id, &key))
            }
        };
        Ok(value)
    }

    /* ===================== Assignment ===================== */

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Pattern,
        value: &Expr,
        scope: &ScopeRef,
    ) -> EvalResult {
        match op {
            AssignOp::Assign => match target {
                Pattern::Ident(name) => {
                    let result = self.eval(value, scope)?;
                    if let Expr::Function(_) = value {
                        self.infer_name(&result, name);
                    }
                    self.assign_identifier(name, result.clone(), scope)?;
                    Ok(result)
                }
                Pattern::Target(expr) => {
                    let reference = self.reference(expr, scope)?;
                    let result = self.eval(value, scope)?;
                    self.put_reference(&reference, result.clone(), scope)?;
                    Ok(result)
                }
                pattern => {
                    let result = self.eval(value, scope)?;
                    self.bind_pattern(pattern, result.clone(), BindMode::Assign, scope)?;
                    Ok(result)
                }
            },
            AssignOp::Compound(op) => {
                let reference = self.pattern_reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let right = self.eval(value, scope)?;
                let result = self.binary(op, &old, &right)?;
                self.put_reference(&reference, result.clone(), scope)?;
                Ok(result)
            }
            AssignOp::Logical(op) => {
                let reference = self.pattern_reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                if short_circuits(op, &old) {
                    return Ok(old);
                }
                let result = self.eval(value, scope)?;
                self.put_reference(&reference, result.clone(), scope)?;
                Ok(result)
            }
        }
    }

    /// Assignment through a member or index expression (destructuring targets)
    pub(crate) fn assign_to_target(&mut self, expr: &Expr, value: Val, scope: &ScopeRef) -> EvalResult<()> {
        let reference = self.reference(expr, scope)?;
        self.put_reference(&reference, value, scope)
    }

    fn pattern_reference(&mut self, target: &Pattern, scope: &ScopeRef) -> EvalResult<Reference> {
        match target {
            Pattern::Ident(name) => Ok(Reference::Binding(name.clone())),
            Pattern::Target(expr) => self.reference(expr, scope),
            _ => self.throw(ErrorKind::SyntaxError, "Invalid left-hand side in assignment"),
        }
    }

    fn reference(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult<Reference> {
        match expr {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member {
                object, property, ..
            } => {
                let target = match object.as_ref() {
                    Expr::Super => self.this_value(scope)?,
                    object => self.eval(object, scope)?,
                };
                Ok(Reference::Property(target, property.clone()))
            }
            Expr::Index { object, index, .. } => {
                let target = match object.as_ref() {
                    Expr::Super => self.this_value(scope)?,
                    object => self.eval(object, scope)?,
                };
                let key = self.eval(index, scope)?;
                let key = self.to_property_key(&key)?;
                Ok(Reference::Property(target, key))
            }
            _ => self.throw(ErrorKind::SyntaxError, "Invalid left-hand side in assignment"),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> EvalResult {
        match reference {
            Reference::Binding(name) => self.lookup(name, scope),
            Reference::Property(target, key) => self.get(target, key),
        }
    }

    fn put_reference(&mut self, reference: &Reference, value: Val, scope: &ScopeRef) -> EvalResult<()> {
        match reference {
            Reference::Binding(name) => self.assign_identifier(name, value, scope),
            Reference::Property(target, key) => self.set(target, key, value),
        }
    }

    /* ===================== Calls ===================== */

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Arg],
        optional: bool,
        scope: &ScopeRef,
    ) -> EvalResult {
        let (func, this) = match callee {
            Expr::Super => {
                let args = self.eval_args(args, scope)?;
                return self.super_call(args, scope);
            }
            Expr::Member {
                object,
                property,
                optional: member_optional,
            } => {
                if let Expr::Super = object.as_ref() {
                    (self.super_get(property, scope)?, self.this_value(scope)?)
                } else {
                    let target = self.eval(object, scope)?;
                    if *member_optional && target.is_nullish() {
                        return Err(Control::ShortCircuit);
                    }
                    (self.get(&target, property)?, target)
                }
            }
            Expr::Index {
                object,
                index,
                optional: member_optional,
            } => {
                let target = self.eval(object, scope)?;
                if *member_optional && target.is_nullish() {
                    return Err(Control::ShortCircuit);
                }
                let key = self.eval(index, scope)?;
                (self.get_computed(&target, &key)?, target)
            }
            other => (self.eval(other, scope)?, Val::Undefined),
        };

        if optional && func.is_nullish() {
            return Err(Control::ShortCircuit);
        }
        let args = self.eval_args(args, scope)?;
        if !self.is_callable(&func) {
            return self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", describe(callee)),
            );
        }
        self.call(&func, this, args)
    }
}

/* ===================== Helpers ===================== */

fn short_circuits(op: LogicalOp, left: &Val) -> bool {
    match op {
        LogicalOp::And => !left.is_truthy(),
        LogicalOp::Or => left.is_truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

/// `**` with the JS edge cases `powf` disagrees on
pub(crate) fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

/// Source-like rendering of a callee for error messages
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Super => "super".to_string(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", describe(object), property),
        Expr::Index { object, index, .. } => match index.as_ref() {
            Expr::Str(key) => format!("{}.{}", describe(object), key),
            Expr::Num(n) => format!(
                "{}[{}]",
                describe(object),
                crate::script::number::number_to_string(*n)
            ),
            _ => format!("{}[...]", describe(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::OptionalChain(inner) => describe(inner),
        Expr::Function(_) => "(intermediate value)".to_string(),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow_edge_cases() {
        assert_eq!(pow(2.0, 10.0), 1024.0);
        assert!(pow(1.0, f64::NAN).is_nan());
        assert!(pow(-1.0, f64::INFINITY).is_nan());
        assert_eq!(pow(f64::NAN, 0.0), 1.0);
    }

    #[test]
    fn test_describe_callee() {
        let callee = Expr::member(Expr::member(Expr::ident("a"), "b"), "c");
        assert_eq!(describe(&callee), "a.b.c");
        let call = Expr::call(Expr::ident("f"), vec![]);
        assert_eq!(describe(&Expr::member(call, "g")), "f(...).g");
    }
}
