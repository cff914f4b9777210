//! Statement execution, hoisting and binding patterns

use std::slice;

use super::control::{Control, EvalResult};
use super::realm::ErrorKind;
use super::scope::{fork, resolve, Binding, Scope, ScopeRef};
use super::values::{strict_equals, FuncKind, ObjId, ObjKind, Val};
use super::Interpreter;
use crate::script::ast::{DeclKind, Expr, Pattern, Stmt};
use crate::script::parser::semantic_validator::bound_names;

/// How a pattern introduces its names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    /// Ordinary assignment through the scope chain (`var`, assignment patterns)
    Assign,
    /// Fresh binding in the given scope (`let`/`const`, parameters, loop heads)
    Declare { mutable: bool },
}

/// Where the values of a `for…of` loop come from
enum IterSource {
    /// Arrays are read live so pushes during the loop are visited
    Array { next: usize, id: ObjId },
    Values(std::vec::IntoIter<Val>),
}

impl<'c> Interpreter<'c> {
    /* ===================== Hoisting ===================== */

    /// Declare the `var`, function and lexical names of a function or program body
    pub(crate) fn hoist_declarations(&mut self, body: &[Stmt], scope: &ScopeRef) {
        let mut names = Vec::new();
        collect_var_names(body, &mut names);
        {
            let mut scope_mut = scope.borrow_mut();
            for name in names {
                if !scope_mut.vars.contains_key(&name) {
                    scope_mut.declare(name, Binding::var(Val::Undefined));
                }
            }
        }
        self.hoist_lexical(body, scope);
    }

    /// Declare block-level names: `let`/`const`/`class` enter their dead zone,
    /// function declarations are created immediately
    pub(crate) fn hoist_lexical(&mut self, body: &[Stmt], scope: &ScopeRef) {
        for stmt in body {
            match stmt {
                Stmt::Decl {
                    kind: kind @ (DeclKind::Let | DeclKind::Const),
                    decls,
                } => {
                    let mut scope_mut = scope.borrow_mut();
                    for decl in decls {
                        for name in bound_names(&decl.target) {
                            scope_mut.declare(name, Binding::uninitialized(*kind == DeclKind::Let));
                        }
                    }
                }
                Stmt::Class(def) => {
                    scope
                        .borrow_mut()
                        .declare(def.name.clone(), Binding::uninitialized(true));
                }
                Stmt::Function(def) => {
                    if let Some(name) = &def.name {
                        let func = self.create_function(def, scope, FuncKind::Normal, None);
                        scope
                            .borrow_mut()
                            .declare(name.clone(), Binding::var(Val::Obj(func)));
                    }
                }
                _ => {}
            }
        }
    }

    /* ===================== Statements ===================== */

    pub(crate) fn exec_statements(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<()> {
        for stmt in body {
            self.exec_stmt(stmt, scope)?;
        }
        Ok(())
    }

    /// Run a nested statement list in its own scope when it declares lexical names
    fn exec_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<()> {
        if body.iter().any(is_lexical) {
            let block_scope = Scope::child(scope);
            self.hoist_lexical(body, &block_scope);
            self.exec_statements(body, &block_scope)
        } else {
            self.exec_statements(body, scope)
        }
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> EvalResult<()> {
        match stmt {
            Stmt::Empty | Stmt::Function(_) => Ok(()),
            Stmt::Expr(expr) => self.eval(expr, scope).map(|_| ()),
            Stmt::Decl { kind, decls } => {
                for decl in decls {
                    let value = match &decl.init {
                        Some(init) => {
                            let value = self.eval(init, scope)?;
                            if let (Pattern::Ident(name), Expr::Function(_)) = (&decl.target, init) {
                                self.infer_name(&value, name);
                            }
                            value
                        }
                        // `var x;` leaves an existing value alone
                        None if *kind == DeclKind::Var => continue,
                        None => Val::Undefined,
                    };
                    let mode = match kind {
                        DeclKind::Var => BindMode::Assign,
                        DeclKind::Let => BindMode::Declare { mutable: true },
                        DeclKind::Const => BindMode::Declare { mutable: false },
                    };
                    self.bind_pattern(&decl.target, value, mode, scope)?;
                }
                Ok(())
            }
            Stmt::Class(def) => {
                let ctor = self.eval_class(def, scope)?;
                scope.borrow_mut().declare(def.name.clone(), Binding::var(ctor));
                Ok(())
            }
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::If {
                test,
                then_s,
                else_s,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.exec_nested(then_s, scope)
                } else if let Some(else_s) = else_s {
                    self.exec_nested(else_s, scope)
                } else {
                    Ok(())
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.is_truthy() {
                    match self.exec_nested(body, scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    match self.exec_nested(body, scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                    if !self.eval(test, scope)?.is_truthy() {
                        break;
                    }
                }
                Ok(())
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            Stmt::ForOf {
                kind,
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let mut source = self.iter_source(&iterable)?;
                while let Some(value) = self.iter_next(&mut source) {
                    match self.exec_loop_body(*kind, target, value, body, scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::ForIn {
                kind,
                target,
                object,
                body,
            } => {
                let object = self.eval(object, scope)?;
                for key in self.for_in_keys(&object) {
                    // Keys deleted during the loop are skipped
                    if let Val::Obj(id) = object {
                        if !self.has_property(id, &key) {
                            continue;
                        }
                    }
                    match self.exec_loop_body(*kind, target, Val::string(key), body, scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval(discriminant, scope)?;
                let switch_scope = Scope::child(scope);
                for case in cases {
                    self.hoist_lexical(&case.body, &switch_scope);
                }

                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        let candidate = self.eval(test, &switch_scope)?;
                        if strict_equals(&value, &candidate) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));

                if let Some(start) = start {
                    for case in &cases[start..] {
                        match self.exec_statements(&case.body, &switch_scope) {
                            Ok(()) => {}
                            Err(Control::Break) => break,
                            Err(other) => return Err(other),
                        }
                    }
                }
                Ok(())
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut outcome = self.exec_block(block, scope);
                if let Some(handler) = handler {
                    if let Err(Control::Throw(thrown)) = outcome {
                        let catch_scope = Scope::child(scope);
                        let bound = match param {
                            Some(param) => self.bind_pattern(
                                param,
                                thrown,
                                BindMode::Declare { mutable: true },
                                &catch_scope,
                            ),
                            None => Ok(()),
                        };
                        outcome = bound.and_then(|()| self.exec_block(handler, &catch_scope));
                    }
                }
                if let Some(finalizer) = finalizer {
                    // An abrupt `finally` overrides the pending completion
                    self.exec_block(finalizer, scope)?;
                }
                outcome
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Val::Undefined,
                };
                Err(Control::Return(value))
            }
            Stmt::Break => Err(Control::Break),
            Stmt::Continue => Err(Control::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                Err(Control::Throw(value))
            }
        }
    }

    /// Body of `if`/loops: a lone declaration still gets its own scope
    fn exec_nested(&mut self, stmt: &Stmt, scope: &ScopeRef) -> EvalResult<()> {
        if is_lexical(stmt) {
            self.exec_block(slice::from_ref(stmt), scope)
        } else {
            self.exec_stmt(stmt, scope)
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        let per_iteration = matches!(
            init,
            Some(Stmt::Decl {
                kind: DeclKind::Let | DeclKind::Const,
                ..
            })
        );
        let loop_scope = Scope::child(scope);
        if let Some(init) = init {
            self.hoist_lexical(slice::from_ref(init), &loop_scope);
            self.exec_stmt(init, &loop_scope)?;
        }

        // Each iteration sees its own copy of the `let` bindings, so closures
        // created in the body capture that iteration's values
        let mut iteration = if per_iteration {
            fork(&loop_scope)
        } else {
            loop_scope
        };
        loop {
            if let Some(test) = test {
                if !self.eval(test, &iteration)?.is_truthy() {
                    break;
                }
            }
            match self.exec_nested(body, &iteration) {
                Ok(()) | Err(Control::Continue) => {}
                Err(Control::Break) => break,
                Err(other) => return Err(other),
            }
            if per_iteration {
                iteration = fork(&iteration);
            }
            if let Some(update) = update {
                self.eval(update, &iteration)?;
            }
        }
        Ok(())
    }

    fn exec_loop_body(
        &mut self,
        kind: DeclKind,
        target: &Pattern,
        value: Val,
        body: &Stmt,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        let iteration = Scope::child(scope);
        let mode = match kind {
            DeclKind::Var => BindMode::Assign,
            DeclKind::Let => BindMode::Declare { mutable: true },
            DeclKind::Const => BindMode::Declare { mutable: false },
        };
        self.bind_pattern(target, value, mode, &iteration)?;
        self.exec_nested(body, &iteration)
    }

    fn iter_source(&mut self, value: &Val) -> EvalResult<IterSource> {
        if let Val::Obj(id) = value {
            if let ObjKind::Array(_) = self.heap.get(*id).kind {
                return Ok(IterSource::Array { next: 0, id: *id });
            }
        }
        Ok(IterSource::Values(self.iterate(value)?.into_iter()))
    }

    fn iter_next(&mut self, source: &mut IterSource) -> Option<Val> {
        match source {
            IterSource::Array { next, id } => {
                let index = *next;
                if index < self.array_len(*id) {
                    *next += 1;
                    Some(self.array_get(*id, index))
                } else {
                    None
                }
            }
            IterSource::Values(values) => values.next(),
        }
    }

    /* ===================== Patterns ===================== */

    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Val,
        mode: BindMode,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        match pattern {
            Pattern::Ident(name) => match mode {
                BindMode::Assign => self.assign_identifier(name, value, scope),
                BindMode::Declare { mutable } => {
                    scope.borrow_mut().declare(
                        name.clone(),
                        Binding {
                            value,
                            mutable,
                            initialized: true,
                        },
                    );
                    Ok(())
                }
            },
            Pattern::Target(expr) => self.assign_to_target(expr, value, scope),
            Pattern::Array { elements, rest } => {
                if value.is_nullish() {
                    return self.not_iterable(&value);
                }
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    let item = items.get(index).cloned().unwrap_or(Val::Undefined);
                    let item = match (&element.default, item) {
                        (Some(default), Val::Undefined) => self.eval(default, scope)?,
                        (_, item) => item,
                    };
                    self.bind_pattern(&element.target, item, mode, scope)?;
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elements.len()..).map(<[Val]>::to_vec).unwrap_or_default();
                    let remaining = self.alloc_array(remaining);
                    self.bind_pattern(rest, remaining, mode, scope)?;
                }
                Ok(())
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    let description = self.describe_value(&value);
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("Cannot destructure '{}' as it is {}.", description, description),
                    );
                }
                let mut used = Vec::with_capacity(props.len());
                for prop in props {
                    let key = self.prop_key(&prop.key, scope)?;
                    let item = self.get(&value, &key)?;
                    let item = match (&prop.default, item) {
                        (Some(default), Val::Undefined) => self.eval(default, scope)?,
                        (_, item) => item,
                    };
                    self.bind_pattern(&prop.target, item, mode, scope)?;
                    used.push(key);
                }
                if let Some(rest) = rest {
                    let remaining = self.alloc_object();
                    for (key, item) in self.own_entries(&value)? {
                        if !used.contains(&key) {
                            self.set(&Val::Obj(remaining), &key, item)?;
                        }
                    }
                    self.bind_pattern(&Pattern::Ident(rest.clone()), Val::Obj(remaining), mode, scope)?;
                }
                Ok(())
            }
        }
    }

    /* ===================== Bindings ===================== */

    pub(crate) fn lookup(&mut self, name: &str, scope: &ScopeRef) -> EvalResult {
        let Some(owner) = resolve(scope, name) else {
            if name == "arguments" {
                if let Some(arguments) = self.arguments_object(scope) {
                    return Ok(arguments);
                }
            }
            return self.throw(ErrorKind::ReferenceError, format!("{} is not defined", name));
        };
        let found = owner
            .borrow()
            .vars
            .get(name)
            .map(|binding| (binding.initialized, binding.value.clone()));
        match found {
            Some((true, value)) => Ok(value),
            _ => self.throw(
                ErrorKind::ReferenceError,
                format!("Cannot access '{}' before initialization", name),
            ),
        }
    }

    pub(crate) fn is_declared(&self, name: &str, scope: &ScopeRef) -> bool {
        resolve(scope, name).is_some()
    }

    pub(crate) fn assign_identifier(&mut self, name: &str, value: Val, scope: &ScopeRef) -> EvalResult<()> {
        let Some(owner) = resolve(scope, name) else {
            if self.strict {
                return self.throw(ErrorKind::ReferenceError, format!("{} is not defined", name));
            }
            self.global.borrow_mut().declare(name, Binding::var(value));
            return Ok(());
        };

        let mut owner = owner.borrow_mut();
        let Some(binding) = owner.vars.get_mut(name) else {
            return Ok(());
        };
        if !binding.initialized {
            drop(owner);
            return self.throw(
                ErrorKind::ReferenceError,
                format!("Cannot access '{}' before initialization", name),
            );
        }
        if !binding.mutable {
            drop(owner);
            return self.throw(ErrorKind::TypeError, "Assignment to constant variable.");
        }
        binding.value = value;
        Ok(())
    }

    /// Materialize `arguments` for the nearest non-arrow function
    fn arguments_object(&mut self, scope: &ScopeRef) -> Option<Val> {
        let owner = super::scope::frame_scope(scope)?;
        let args = {
            let owner_ref = owner.borrow();
            let frame = owner_ref.frame.as_ref()?;
            frame.func?;
            frame.args.clone()
        };
        let arguments = self.alloc_array(args);
        owner
            .borrow_mut()
            .declare("arguments", Binding::var(arguments.clone()));
        Some(arguments)
    }
}

/* ===================== Helpers ===================== */

fn is_lexical(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Decl {
            kind: DeclKind::Let | DeclKind::Const,
            ..
        } | Stmt::Class(_)
            | Stmt::Function(_)
    )
}

/// `var` names declared anywhere in `body`, not descending into functions
fn collect_var_names(body: &[Stmt], names: &mut Vec<String>) {
    for stmt in body {
        collect_stmt_vars(stmt, names);
    }
}

fn collect_stmt_vars(stmt: &Stmt, names: &mut Vec<String>) {
    match stmt {
        Stmt::Decl {
            kind: DeclKind::Var,
            decls,
        } => {
            for decl in decls {
                names.extend(bound_names(&decl.target));
            }
        }
        Stmt::Block(body) => collect_var_names(body, names),
        Stmt::If { then_s, else_s, .. } => {
            collect_stmt_vars(then_s, names);
            if let Some(else_s) = else_s {
                collect_stmt_vars(else_s, names);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_stmt_vars(body, names),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                collect_stmt_vars(init, names);
            }
            collect_stmt_vars(body, names);
        }
        Stmt::ForOf {
            kind, target, body, ..
        }
        | Stmt::ForIn {
            kind, target, body, ..
        } => {
            if *kind == DeclKind::Var {
                names.extend(bound_names(target));
            }
            collect_stmt_vars(body, names);
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                collect_var_names(&case.body, names);
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(handler, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}
