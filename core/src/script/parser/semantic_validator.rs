//! Semantic validation for lowered snippet programs
//!
//! Early errors the grammar cannot express: redeclared lexical bindings,
//! misplaced `break`/`continue`/`super`, missing `const` initializers.
//! Strict mode adds the binding-name and parameter rules.

use std::collections::HashSet;

use crate::script::ast::{
    Arg, ClassDef, DeclKind, Expr, FunctionDef, ObjectProp, Param, Pattern, PropKey, Stmt,
    UnaryOp,
};

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `let`/`const`/`class` name declared twice in one scope
    DuplicateDeclaration { name: String },
    IllegalBreak,
    IllegalContinue,
    MissingConstInitializer,
    /// `super` outside a method, or `super()` outside a derived constructor
    UnexpectedSuper,
    /// `{ a = 1 }` used as a value instead of a pattern
    InvalidShorthandInitializer,
    /// `eval` or `arguments` bound or assigned in strict mode
    RestrictedBinding { name: String },
    /// Strict mode reserved word used as a binding name
    ReservedIdentifier { name: String },
    DuplicateParameter { name: String },
    DeleteIdentifier,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::DuplicateDeclaration { name } => {
                write!(f, "Identifier '{}' has already been declared", name)
            }
            ValidationError::IllegalBreak => write!(f, "Illegal break statement"),
            ValidationError::IllegalContinue => write!(
                f,
                "Illegal continue statement: no surrounding iteration statement"
            ),
            ValidationError::MissingConstInitializer => {
                write!(f, "Missing initializer in const declaration")
            }
            ValidationError::UnexpectedSuper => write!(f, "'super' keyword unexpected here"),
            ValidationError::InvalidShorthandInitializer => {
                write!(f, "Invalid shorthand property initializer")
            }
            ValidationError::RestrictedBinding { name } => {
                write!(f, "Unexpected {} in strict mode", name)
            }
            ValidationError::ReservedIdentifier { name } => {
                write!(f, "Unexpected strict mode reserved word '{}'", name)
            }
            ValidationError::DuplicateParameter { name } => write!(
                f,
                "Duplicate parameter name '{}' not allowed in this context",
                name
            ),
            ValidationError::DeleteIdentifier => {
                write!(f, "Delete of an unqualified identifier in strict mode.")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

/* ===================== Public API ===================== */

/// Words reserved in strict mode code
const RESERVED_IDENTIFIERS: &[&str] = &[
    "implements", "interface", "let", "package", "private", "protected", "public", "static",
    "yield",
];

/// Names that strict mode code may not bind or assign
const RESTRICTED_NAMES: &[&str] = &["eval", "arguments"];

/// Validate a lowered program
pub fn validate_program(body: &[Stmt], strict: bool) -> ValidationResult<()> {
    let validator = Validator { strict };
    validator.check_scope(body, &[], Context::default())
}

/* ===================== Validator ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SuperScope {
    #[default]
    None,
    Method,
    DerivedConstructor,
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    in_loop: bool,
    in_switch: bool,
    super_scope: SuperScope,
}

impl Context {
    fn looping(self) -> Self {
        Self { in_loop: true, ..self }
    }

    fn switching(self) -> Self {
        Self { in_switch: true, ..self }
    }

    fn function(self, super_scope: SuperScope) -> Self {
        Self {
            in_loop: false,
            in_switch: false,
            super_scope,
        }
    }
}

struct Validator {
    strict: bool,
}

impl Validator {
    /// A statement list that forms one lexical scope
    fn check_scope(&self, stmts: &[Stmt], params: &[String], ctx: Context) -> ValidationResult<()> {
        let mut lexical: HashSet<String> = HashSet::new();
        let mut var_like: HashSet<String> = HashSet::new();

        for stmt in stmts {
            match stmt {
                Stmt::Decl { kind, decls } => {
                    for decl in decls {
                        for name in bound_names(&decl.target) {
                            self.check_binding_name(&name)?;
                            let clash = match kind {
                                DeclKind::Var => lexical.contains(&name),
                                _ => {
                                    lexical.contains(&name)
                                        || var_like.contains(&name)
                                        || params.contains(&name)
                                }
                            };
                            if clash {
                                return Err(ValidationError::DuplicateDeclaration { name });
                            }
                            if *kind == DeclKind::Var {
                                var_like.insert(name);
                            } else {
                                lexical.insert(name);
                            }
                        }
                    }
                }
                Stmt::Class(class) => {
                    let name = class.name.clone();
                    if lexical.contains(&name) || var_like.contains(&name) || params.contains(&name) {
                        return Err(ValidationError::DuplicateDeclaration { name });
                    }
                    lexical.insert(name);
                }
                Stmt::Function(func) => {
                    if let Some(name) = &func.name {
                        self.check_binding_name(name)?;
                        if lexical.contains(name) {
                            return Err(ValidationError::DuplicateDeclaration { name: name.clone() });
                        }
                        var_like.insert(name.clone());
                    }
                }
                _ => {}
            }
            self.check_statement(stmt, ctx)?;
        }

        Ok(())
    }

    fn check_statement(&self, stmt: &Stmt, ctx: Context) -> ValidationResult<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Expr(expr) | Stmt::Throw(expr) => self.check_expr(expr, ctx),
            Stmt::Return(value) => match value {
                Some(expr) => self.check_expr(expr, ctx),
                None => Ok(()),
            },
            Stmt::Decl { kind, decls } => {
                for decl in decls {
                    if *kind == DeclKind::Const && decl.init.is_none() {
                        return Err(ValidationError::MissingConstInitializer);
                    }
                    self.check_pattern(&decl.target, ctx)?;
                    if let Some(init) = &decl.init {
                        self.check_expr(init, ctx)?;
                    }
                }
                Ok(())
            }
            Stmt::Function(func) => self.check_function(func, SuperScope::None, ctx),
            Stmt::Class(class) => self.check_class(class, ctx),
            Stmt::Block(body) => self.check_scope(body, &[], ctx),
            Stmt::If { test, then_s, else_s } => {
                self.check_expr(test, ctx)?;
                self.check_nested(then_s, ctx)?;
                match else_s {
                    Some(alt) => self.check_nested(alt, ctx),
                    None => Ok(()),
                }
            }
            Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
                self.check_expr(test, ctx)?;
                self.check_nested(body, ctx.looping())
            }
            Stmt::For { init, test, update, body } => {
                if let Some(init) = init {
                    self.check_scope(std::slice::from_ref(init.as_ref()), &[], ctx)?;
                }
                if let Some(test) = test {
                    self.check_expr(test, ctx)?;
                }
                if let Some(update) = update {
                    self.check_expr(update, ctx)?;
                }
                self.check_nested(body, ctx.looping())
            }
            Stmt::ForOf { target, iterable: subject, body, .. }
            | Stmt::ForIn { target, object: subject, body, .. } => {
                for name in bound_names(target) {
                    self.check_binding_name(&name)?;
                }
                self.check_pattern(target, ctx)?;
                self.check_expr(subject, ctx)?;
                self.check_nested(body, ctx.looping())
            }
            Stmt::Switch { discriminant, cases } => {
                self.check_expr(discriminant, ctx)?;
                let mut body = Vec::new();
                for case in cases {
                    if let Some(test) = &case.test {
                        self.check_expr(test, ctx)?;
                    }
                    body.extend(case.body.iter().cloned());
                }
                self.check_scope(&body, &[], ctx.switching())
            }
            Stmt::Try { block, param, handler, finalizer } => {
                self.check_scope(block, &[], ctx)?;
                if let Some(handler) = handler {
                    let names = match param {
                        Some(pattern) => bound_names(pattern),
                        None => Vec::new(),
                    };
                    for name in &names {
                        self.check_binding_name(name)?;
                    }
                    self.check_scope(handler, &names, ctx)?;
                }
                match finalizer {
                    Some(finalizer) => self.check_scope(finalizer, &[], ctx),
                    None => Ok(()),
                }
            }
            Stmt::Break => {
                if ctx.in_loop || ctx.in_switch {
                    Ok(())
                } else {
                    Err(ValidationError::IllegalBreak)
                }
            }
            Stmt::Continue => {
                if ctx.in_loop {
                    Ok(())
                } else {
                    Err(ValidationError::IllegalContinue)
                }
            }
        }
    }

    /// Sub-statement of a compound statement; a lone declaration still gets its own scope
    fn check_nested(&self, stmt: &Stmt, ctx: Context) -> ValidationResult<()> {
        match stmt {
            Stmt::Block(body) => self.check_scope(body, &[], ctx),
            other => self.check_scope(std::slice::from_ref(other), &[], ctx),
        }
    }

    fn check_function(
        &self,
        func: &FunctionDef,
        super_scope: SuperScope,
        ctx: Context,
    ) -> ValidationResult<()> {
        let names = self.check_params(&func.params, func.is_arrow, ctx)?;
        let inner = if func.is_arrow {
            ctx.function(ctx.super_scope)
        } else {
            ctx.function(super_scope)
        };
        self.check_scope(&func.body, &names, inner)
    }

    fn check_params(&self, params: &[Param], is_arrow: bool, ctx: Context) -> ValidationResult<Vec<String>> {
        let mut seen: Vec<String> = Vec::new();
        for param in params {
            for name in bound_names(&param.target) {
                self.check_binding_name(&name)?;
                if (self.strict || is_arrow) && seen.contains(&name) {
                    return Err(ValidationError::DuplicateParameter { name });
                }
                seen.push(name);
            }
            self.check_pattern(&param.target, ctx)?;
            if let Some(default) = &param.default {
                self.check_expr(default, ctx)?;
            }
        }
        Ok(seen)
    }

    fn check_class(&self, class: &ClassDef, ctx: Context) -> ValidationResult<()> {
        if let Some(parent) = &class.parent {
            self.check_expr(parent, ctx)?;
        }

        let ctor_scope = if class.parent.is_some() {
            SuperScope::DerivedConstructor
        } else {
            SuperScope::Method
        };
        self.check_function(&class.constructor, ctor_scope, ctx)?;

        for method in &class.methods {
            if let PropKey::Computed(key) = &method.key {
                self.check_expr(key, ctx)?;
            }
            self.check_function(&method.func, SuperScope::Method, ctx)?;
        }

        let static_ctx = ctx.function(SuperScope::Method);
        for field in &class.statics {
            if let PropKey::Computed(key) = &field.key {
                self.check_expr(key, ctx)?;
            }
            if let Some(value) = &field.value {
                self.check_expr(value, static_ctx)?;
            }
        }

        Ok(())
    }

    fn check_pattern(&self, pattern: &Pattern, ctx: Context) -> ValidationResult<()> {
        match pattern {
            Pattern::Ident(name) => {
                if self.strict && RESTRICTED_NAMES.contains(&name.as_str()) {
                    return Err(ValidationError::RestrictedBinding { name: name.clone() });
                }
                Ok(())
            }
            Pattern::Target(expr) => self.check_expr(expr, ctx),
            Pattern::Array { elements, rest } => {
                for elem in elements {
                    self.check_pattern(&elem.target, ctx)?;
                    if let Some(default) = &elem.default {
                        self.check_expr(default, ctx)?;
                    }
                }
                match rest {
                    Some(rest) => self.check_pattern(rest, ctx),
                    None => Ok(()),
                }
            }
            Pattern::Object { props, .. } => {
                for prop in props {
                    if let PropKey::Computed(key) = &prop.key {
                        self.check_expr(key, ctx)?;
                    }
                    self.check_pattern(&prop.target, ctx)?;
                    if let Some(default) = &prop.default {
                        self.check_expr(default, ctx)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn check_args(&self, args: &[Arg], ctx: Context) -> ValidationResult<()> {
        for arg in args {
            match arg {
                Arg::Plain(expr) | Arg::Spread(expr) => self.check_expr(expr, ctx)?,
            }
        }
        Ok(())
    }

    fn check_expr(&self, expr: &Expr, ctx: Context) -> ValidationResult<()> {
        match expr {
            Expr::Num(_)
            | Expr::Str(_)
            | Expr::Bool(_)
            | Expr::Null
            | Expr::Ident(_)
            | Expr::This => Ok(()),
            // Only valid as a callee or member object, handled below
            Expr::Super => Err(ValidationError::UnexpectedSuper),
            Expr::Array(items) => self.check_args(items, ctx),
            Expr::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue(key, value) => {
                            if let PropKey::Computed(key) = key {
                                self.check_expr(key, ctx)?;
                            }
                            match value {
                                // object literal methods may use super.x
                                Expr::Function(func) if !func.is_arrow => {
                                    self.check_function(func, SuperScope::Method, ctx)?
                                }
                                other => self.check_expr(other, ctx)?,
                            }
                        }
                        ObjectProp::Spread(value) => self.check_expr(value, ctx)?,
                        ObjectProp::CoverInit { .. } => {
                            return Err(ValidationError::InvalidShorthandInitializer)
                        }
                    }
                }
                Ok(())
            }
            Expr::Function(func) => self.check_function(func, SuperScope::None, ctx),
            Expr::Unary { op, arg } => {
                if self.strict && *op == UnaryOp::Delete && matches!(**arg, Expr::Ident(_)) {
                    return Err(ValidationError::DeleteIdentifier);
                }
                self.check_expr(arg, ctx)
            }
            Expr::Update { target, .. } => {
                if let Expr::Ident(name) = target.as_ref() {
                    self.check_assigned_name(name)?;
                }
                self.check_expr(target, ctx)
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.check_expr(left, ctx)?;
                self.check_expr(right, ctx)
            }
            Expr::Assign { target, value, .. } => {
                if let Pattern::Ident(name) = target.as_ref() {
                    self.check_assigned_name(name)?;
                }
                self.check_pattern(target, ctx)?;
                self.check_expr(value, ctx)
            }
            Expr::Cond { test, cons, alt } => {
                self.check_expr(test, ctx)?;
                self.check_expr(cons, ctx)?;
                self.check_expr(alt, ctx)
            }
            Expr::Call { callee, args, .. } => {
                match callee.as_ref() {
                    Expr::Super => {
                        if ctx.super_scope != SuperScope::DerivedConstructor {
                            return Err(ValidationError::UnexpectedSuper);
                        }
                    }
                    other => self.check_expr(other, ctx)?,
                }
                self.check_args(args, ctx)
            }
            Expr::New { callee, args } => {
                self.check_expr(callee, ctx)?;
                self.check_args(args, ctx)
            }
            Expr::Member { object, .. } => self.check_member_object(object, ctx),
            Expr::Index { object, index, .. } => {
                self.check_member_object(object, ctx)?;
                self.check_expr(index, ctx)
            }
            Expr::OptionalChain(inner) => self.check_expr(inner, ctx),
            Expr::Seq(exprs) => {
                for expr in exprs {
                    self.check_expr(expr, ctx)?;
                }
                Ok(())
            }
        }
    }

    fn check_member_object(&self, object: &Expr, ctx: Context) -> ValidationResult<()> {
        match object {
            Expr::Super if ctx.super_scope == SuperScope::None => {
                Err(ValidationError::UnexpectedSuper)
            }
            Expr::Super => Ok(()),
            other => self.check_expr(other, ctx),
        }
    }

    fn check_binding_name(&self, name: &str) -> ValidationResult<()> {
        if !self.strict {
            return Ok(());
        }
        if RESTRICTED_NAMES.contains(&name) {
            return Err(ValidationError::RestrictedBinding {
                name: name.to_string(),
            });
        }
        if RESERVED_IDENTIFIERS.contains(&name) {
            return Err(ValidationError::ReservedIdentifier {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_assigned_name(&self, name: &str) -> ValidationResult<()> {
        if self.strict && RESTRICTED_NAMES.contains(&name) {
            return Err(ValidationError::RestrictedBinding {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Names a pattern introduces
pub fn bound_names(pattern: &Pattern) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(pattern, &mut names);
    names
}

fn collect_names(pattern: &Pattern, names: &mut Vec<String>) {
    match pattern {
        Pattern::Ident(name) => names.push(name.clone()),
        Pattern::Target(_) => {}
        Pattern::Array { elements, rest } => {
            for elem in elements {
                collect_names(&elem.target, names);
            }
            if let Some(rest) = rest {
                collect_names(rest, names);
            }
        }
        Pattern::Object { props, rest } => {
            for prop in props {
                collect_names(&prop.target, names);
            }
            if let Some(rest) = rest {
                names.push(rest.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ScriptTarget;
    use crate::script::parser;

    fn check(source: &str, strict: bool) -> ValidationResult<()> {
        let body = parser::parse_program(source, ScriptTarget::Es2015).expect("Should parse");
        validate_program(&body, strict)
    }

    #[test]
    fn test_valid_program_passes() {
        let source = r#"
            let total = 0;
            for (const n of [1, 2, 3]) {
                if (n === 2) continue;
                total += n;
            }
            switch (total) {
                case 4: break;
            }
        "#;
        assert!(check(source, true).is_ok());
    }

    #[test]
    fn test_duplicate_let_rejected() {
        let err = check("let a = 1;\nlet a = 2;", false).unwrap_err();
        assert_eq!(err.to_string(), "Identifier 'a' has already been declared");
    }

    #[test]
    fn test_shadowing_in_nested_block_allowed() {
        assert!(check("let a = 1; { let a = 2; }", true).is_ok());
    }

    #[test]
    fn test_var_after_let_rejected() {
        assert_eq!(
            check("let a = 1; var a = 2;", false),
            Err(ValidationError::DuplicateDeclaration { name: "a".to_string() })
        );
    }

    #[test]
    fn test_var_redeclaration_allowed() {
        assert!(check("var a = 1; var a = 2;", true).is_ok());
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(check("break;", false), Err(ValidationError::IllegalBreak));
        assert_eq!(
            check("while (true) { const f = () => { continue; }; }", false),
            Err(ValidationError::IllegalContinue)
        );
    }

    #[test]
    fn test_const_requires_initializer() {
        assert_eq!(
            check("const x;", false),
            Err(ValidationError::MissingConstInitializer)
        );
    }

    #[test]
    fn test_super_placement() {
        let ok = r#"
            class A { greet() { return "a"; } }
            class B extends A {
                constructor() { super(); }
                greet() { return super.greet() + "b"; }
            }
        "#;
        assert!(check(ok, true).is_ok());

        assert_eq!(
            check("function f() { return super.x; }", true),
            Err(ValidationError::UnexpectedSuper)
        );
        assert_eq!(
            check("class A { constructor() { super(); } }", true),
            Err(ValidationError::UnexpectedSuper)
        );
    }

    #[test]
    fn test_strict_mode_rules() {
        assert!(check("var eval = 1;", false).is_ok());
        assert_eq!(
            check("var eval = 1;", true),
            Err(ValidationError::RestrictedBinding { name: "eval".to_string() })
        );
        assert_eq!(
            check("function f(a, a) {}", true),
            Err(ValidationError::DuplicateParameter { name: "a".to_string() })
        );
        assert!(check("function f(a, a) {}", false).is_ok());
        assert_eq!(
            check("let x = 1; delete x;", true),
            Err(ValidationError::DeleteIdentifier)
        );
        assert_eq!(
            check("let yield = 1;", true),
            Err(ValidationError::ReservedIdentifier { name: "yield".to_string() })
        );
    }

    #[test]
    fn test_shorthand_initializer_outside_pattern() {
        assert_eq!(
            check("const o = { a = 1 };", false),
            Err(ValidationError::InvalidShorthandInitializer)
        );
        assert!(check("let a; ({ a = 1 } = {});", false).is_ok());
    }
}
