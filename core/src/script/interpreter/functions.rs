//! Function objects, calls, construction and classes

use std::sync::Arc;

use super::control::{Control, EvalResult};
use super::realm::ErrorKind;
use super::scope::{frame_scope, with_frame, Binding, FuncFrame, Scope, ScopeRef};
use super::statements::BindMode;
use super::stdlib::Native;
use super::values::{Func, FuncKind, HeapObj, ObjId, ObjKind, Prop, Val};
use super::Interpreter;
use crate::script::ast::{ClassDef, FunctionDef, MethodKind, Param};

const SUPER_BEFORE_THIS: &str =
    "Must call super constructor in derived class before accessing 'this' or returning from derived constructor";

impl<'c> Interpreter<'c> {
    /* ===================== Function Objects ===================== */

    pub(crate) fn create_function(
        &mut self,
        def: &Arc<FunctionDef>,
        env: &ScopeRef,
        kind: FuncKind,
        home: Option<ObjId>,
    ) -> ObjId {
        let mut obj = HeapObj::new(
            ObjKind::Function(Func::Script {
                def: def.clone(),
                env: env.clone(),
                kind,
                home,
            }),
            Some(self.realm.function_proto),
        );
        obj.props.insert(
            "name".to_string(),
            Prop::hidden(Val::string(def.name.as_deref().unwrap_or(""))),
        );
        let id = self.heap.alloc(obj);

        if kind == FuncKind::Normal {
            let prototype = self.alloc_object();
            self.heap
                .define(prototype, "constructor", Prop::hidden(Val::Obj(id)));
            self.heap
                .define(id, "prototype", Prop::hidden(Val::Obj(prototype)));
        }
        id
    }

    /// Name an anonymous function after the binding or key it is assigned to
    pub(crate) fn infer_name(&mut self, value: &Val, name: &str) {
        let Val::Obj(id) = value else {
            return;
        };
        let obj = self.heap.get_mut(*id);
        if !obj.is_callable() {
            return;
        }
        match obj.props.get("name") {
            Some(Prop::Data {
                value: Val::Str(current),
                ..
            }) if !current.is_empty() => {}
            _ => {
                obj.props
                    .insert("name".to_string(), Prop::hidden(Val::string(name)));
            }
        }
    }

    fn function_payload(&self, callee: &Val) -> Option<(ObjId, Func)> {
        match callee {
            Val::Obj(id) => match &self.heap.get(*id).kind {
                ObjKind::Function(func) => Some((*id, func.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    /* ===================== Calls ===================== */

    /// Call `callee` with an explicit receiver
    pub(crate) fn call(&mut self, callee: &Val, this: Val, args: Vec<Val>) -> EvalResult {
        let Some((id, func)) = self.function_payload(callee) else {
            let description = self.describe_value(callee);
            return self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", description),
            );
        };

        match func {
            Func::Native(native) => self.call_native(native, this, args),
            Func::Bound {
                target,
                this: bound_this,
                args: mut bound_args,
            } => {
                bound_args.extend(args);
                self.call(&Val::Obj(target), bound_this, bound_args)
            }
            Func::Script {
                def,
                env,
                kind,
                home,
            } => {
                if let FuncKind::ClassConstructor { .. } = kind {
                    let name = self.function_name(callee);
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("Class constructor {} cannot be invoked without 'new'", name),
                    );
                }
                let this = match kind {
                    FuncKind::Arrow => None,
                    _ => Some(this),
                };
                let (returned, _) = self.invoke(id, &def, &env, kind, home, this, args, None)?;
                Ok(returned)
            }
        }
    }

    /// `new callee(...args)` with `new_target` supplying the prototype
    pub(crate) fn construct(&mut self, callee: &Val, args: Vec<Val>, new_target: ObjId) -> EvalResult {
        let Some((id, func)) = self.function_payload(callee) else {
            return self.not_a_constructor(callee);
        };

        match func {
            Func::Native(Native::Ctor(ctor)) => self.construct_native(ctor, args, new_target),
            Func::Native(_) => self.not_a_constructor(callee),
            Func::Bound {
                target,
                args: mut bound_args,
                ..
            } => {
                bound_args.extend(args);
                let new_target = if new_target == id { target } else { new_target };
                self.construct(&Val::Obj(target), bound_args, new_target)
            }
            Func::Script {
                def,
                env,
                kind,
                home,
            } => match kind {
                FuncKind::Normal | FuncKind::ClassConstructor { derived: false } => {
                    let proto = self.prototype_for(new_target, self.realm.object_proto)?;
                    let instance = Val::Obj(self.alloc_plain(Some(proto)));
                    let (returned, _) = self.invoke(
                        id,
                        &def,
                        &env,
                        kind,
                        home,
                        Some(instance.clone()),
                        args,
                        Some(new_target),
                    )?;
                    Ok(match returned {
                        Val::Obj(_) => returned,
                        _ => instance,
                    })
                }
                FuncKind::ClassConstructor { derived: true } => {
                    let (returned, this) =
                        self.invoke(id, &def, &env, kind, home, None, args, Some(new_target))?;
                    if let Val::Obj(_) = returned {
                        return Ok(returned);
                    }
                    match this {
                        Some(instance) => Ok(instance),
                        None => self.throw(ErrorKind::ReferenceError, SUPER_BEFORE_THIS),
                    }
                }
                FuncKind::Arrow | FuncKind::Method => self.not_a_constructor(callee),
            },
        }
    }

    fn not_a_constructor<T>(&mut self, callee: &Val) -> EvalResult<T> {
        let description = match callee {
            Val::Obj(_) if self.is_callable(callee) => self.function_name(callee),
            other => self.describe_value(other),
        };
        self.throw(
            ErrorKind::TypeError,
            format!("{} is not a constructor", description),
        )
    }

    /// Run a script function body; returns the completion value and the final `this`
    #[allow(clippy::too_many_arguments)]
    fn invoke(
        &mut self,
        func: ObjId,
        def: &FunctionDef,
        env: &ScopeRef,
        kind: FuncKind,
        home: Option<ObjId>,
        this: Option<Val>,
        args: Vec<Val>,
        new_target: Option<ObjId>,
    ) -> EvalResult<(Val, Option<Val>)> {
        self.depth += 1;
        let result = if self.depth > self.limits.max_call_depth {
            self.throw(ErrorKind::RangeError, "Maximum call stack size exceeded")
        } else {
            let scope = match kind {
                FuncKind::Arrow => Scope::child(env),
                _ => Scope::function(
                    env,
                    FuncFrame {
                        this,
                        func: Some(func),
                        home,
                        new_target,
                        args: args.clone(),
                    },
                ),
            };
            self.run_body(def, &scope, &args)
        };
        self.depth -= 1;
        result
    }

    fn run_body(
        &mut self,
        def: &FunctionDef,
        scope: &ScopeRef,
        args: &[Val],
    ) -> EvalResult<(Val, Option<Val>)> {
        self.bind_params(&def.params, args, scope)?;
        self.hoist_declarations(&def.body, scope);

        let returned = match self.exec_statements(&def.body, scope) {
            Ok(()) => Val::Undefined,
            Err(Control::Return(value)) => value,
            Err(other) => return Err(other),
        };
        let this = scope
            .borrow()
            .frame
            .as_ref()
            .and_then(|frame| frame.this.clone());
        Ok((returned, this))
    }

    fn bind_params(&mut self, params: &[Param], args: &[Val], scope: &ScopeRef) -> EvalResult<()> {
        for (index, param) in params.iter().enumerate() {
            let value = if param.rest {
                let rest = args.get(index..).map(<[Val]>::to_vec).unwrap_or_default();
                self.alloc_array(rest)
            } else {
                args.get(index).cloned().unwrap_or(Val::Undefined)
            };
            let value = match (&param.default, value) {
                (Some(default), Val::Undefined) => self.eval(default, scope)?,
                (_, value) => value,
            };
            self.bind_pattern(&param.target, value, BindMode::Declare { mutable: true }, scope)?;
        }
        Ok(())
    }

    /* ===================== this & super ===================== */

    pub(crate) fn this_value(&mut self, scope: &ScopeRef) -> EvalResult {
        match with_frame(scope, |frame| frame.this.clone()).flatten() {
            Some(value) => Ok(value),
            None => self.throw(ErrorKind::ReferenceError, SUPER_BEFORE_THIS),
        }
    }

    /// `super(...args)` inside a derived constructor
    pub(crate) fn super_call(&mut self, args: Vec<Val>, scope: &ScopeRef) -> EvalResult {
        let Some(owner) = frame_scope(scope) else {
            return self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here");
        };
        let (func, new_target, bound) = match owner.borrow().frame.as_ref() {
            Some(frame) => (frame.func, frame.new_target, frame.this.is_some()),
            None => (None, None, false),
        };
        let (Some(func), Some(new_target)) = (func, new_target) else {
            return self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here");
        };

        let parent = self.heap.get(func).proto;
        let parent = match parent {
            Some(parent) if self.is_constructor(&Val::Obj(parent)) => parent,
            _ => {
                return self.throw(
                    ErrorKind::TypeError,
                    "Super constructor null of anonymous class is not a constructor",
                )
            }
        };
        if bound {
            return self.throw(
                ErrorKind::ReferenceError,
                "Super constructor may only be called once",
            );
        }

        let instance = self.construct(&Val::Obj(parent), args, new_target)?;
        if let Some(frame) = owner.borrow_mut().frame.as_mut() {
            frame.this = Some(instance);
        }
        Ok(Val::Undefined)
    }

    /// Prototype `super.x` starts its lookup from, with the receiver to use
    pub(crate) fn super_base(&mut self, scope: &ScopeRef) -> EvalResult<(Option<ObjId>, Val)> {
        let Some(home) = with_frame(scope, |frame| frame.home).flatten() else {
            return self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here");
        };
        let this = self.this_value(scope)?;
        Ok((self.heap.get(home).proto, this))
    }

    pub(crate) fn super_get(&mut self, key: &str, scope: &ScopeRef) -> EvalResult {
        match self.super_base(scope)? {
            (Some(start), this) => self.get_from(start, key, &this),
            (None, _) => Ok(Val::Undefined),
        }
    }

    /* ===================== Classes ===================== */

    pub(crate) fn eval_class(&mut self, def: &ClassDef, scope: &ScopeRef) -> EvalResult {
        let (proto_parent, ctor_parent) = match &def.parent {
            None => (Some(self.realm.object_proto), self.realm.function_proto),
            Some(expr) => {
                let parent = self.eval(expr, scope)?;
                match parent {
                    Val::Null => (None, self.realm.function_proto),
                    Val::Obj(parent_id) if self.is_constructor(&parent) => {
                        match self.get(&parent, "prototype")? {
                            Val::Obj(proto) => (Some(proto), parent_id),
                            Val::Null => (None, parent_id),
                            other => {
                                let description = self.describe_value(&other);
                                return self.throw(
                                    ErrorKind::TypeError,
                                    format!(
                                        "Class extends value does not have valid prototype property {}",
                                        description
                                    ),
                                );
                            }
                        }
                    }
                    other => {
                        let description = self.describe_value(&other);
                        return self.throw(
                            ErrorKind::TypeError,
                            format!(
                                "Class extends value {} is not a constructor or null",
                                description
                            ),
                        );
                    }
                }
            }
        };

        // Methods see the class name as an immutable inner binding
        let class_scope = Scope::child(scope);
        let prototype = self.alloc_plain(proto_parent);
        let ctor = self.create_function(
            &def.constructor,
            &class_scope,
            FuncKind::ClassConstructor {
                derived: def.parent.is_some(),
            },
            Some(prototype),
        );
        {
            let obj = self.heap.get_mut(ctor);
            obj.proto = Some(ctor_parent);
            obj.props
                .insert("name".to_string(), Prop::hidden(Val::string(&def.name)));
            obj.props
                .insert("prototype".to_string(), Prop::hidden(Val::Obj(prototype)));
        }
        self.heap
            .define(prototype, "constructor", Prop::hidden(Val::Obj(ctor)));
        class_scope.borrow_mut().declare(
            def.name.clone(),
            Binding {
                value: Val::Obj(ctor),
                mutable: false,
                initialized: true,
            },
        );

        for method in &def.methods {
            let target = if method.is_static { ctor } else { prototype };
            let key = self.prop_key(&method.key, &class_scope)?;
            let func = self.create_function(&method.func, &class_scope, FuncKind::Method, Some(target));
            let func = Val::Obj(func);
            let existing = self.heap.get(target).props.get(&key).cloned();
            let prop = match (method.kind, existing) {
                (MethodKind::Method, _) => {
                    self.infer_name(&func, &key);
                    Prop::hidden(func)
                }
                (MethodKind::Getter, Some(Prop::Accessor { set, .. })) => Prop::Accessor {
                    get: Some(func),
                    set,
                },
                (MethodKind::Getter, _) => Prop::Accessor {
                    get: Some(func),
                    set: None,
                },
                (MethodKind::Setter, Some(Prop::Accessor { get, .. })) => Prop::Accessor {
                    get,
                    set: Some(func),
                },
                (MethodKind::Setter, _) => Prop::Accessor {
                    get: None,
                    set: Some(func),
                },
            };
            self.heap.define(target, key, prop);
        }

        for field in &def.statics {
            let key = self.prop_key(&field.key, &class_scope)?;
            let value = match &field.value {
                Some(expr) => {
                    let field_scope = Scope::function(
                        &class_scope,
                        FuncFrame {
                            this: Some(Val::Obj(ctor)),
                            home: Some(ctor),
                            ..FuncFrame::default()
                        },
                    );
                    let value = self.eval(expr, &field_scope)?;
                    self.infer_name(&value, &key);
                    value
                }
                None => Val::Undefined,
            };
            self.heap.define(ctor, key, Prop::data(value));
        }

        Ok(Val::Obj(ctor))
    }

    /* ===================== Function.prototype ===================== */

    pub(crate) fn bind_function(&mut self, target: &Val, this: Val, args: Vec<Val>) -> EvalResult {
        let Val::Obj(target_id) = target else {
            return self.throw(ErrorKind::TypeError, "Bind must be called on a function");
        };
        if !self.is_callable(target) {
            return self.throw(ErrorKind::TypeError, "Bind must be called on a function");
        }
        let name = format!("bound {}", self.function_name(target));
        let mut obj = HeapObj::new(
            ObjKind::Function(Func::Bound {
                target: *target_id,
                this,
                args,
            }),
            Some(self.realm.function_proto),
        );
        obj.props
            .insert("name".to_string(), Prop::hidden(Val::string(name)));
        Ok(Val::Obj(self.heap.alloc(obj)))
    }
}
