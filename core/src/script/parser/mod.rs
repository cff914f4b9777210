//! Script parser - PEST-based front end for snippet source
//!
//! Parses the TypeScript-flavoured snippet language and builds the lowered
//! AST in one pass: type syntax is dropped, and enums, parameter properties,
//! instance fields and template literals become plain statements and
//! expressions. `**` is rewritten to `Math.pow` below ES2016.

use std::iter::Peekable;
use std::sync::Arc;
use std::vec::IntoIter;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{
    Arg, AssignOp, BinaryOp, ClassDef, DeclKind, Declarator, Expr, FieldDef, FunctionDef,
    LogicalOp, MethodDef, MethodKind, ObjectProp, Param, Pattern, PatternElem, PatternProp,
    PropKey, Stmt, SwitchCase, UnaryOp, UpdateOp,
};
use super::number::{number_to_string, parse_radix_digits};
use crate::compiler::{Diagnostic, ScriptTarget};

pub mod semantic_validator;

#[cfg(test)]
mod tests;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "script/parser/script.pest"]
struct ScriptParser;

pub type BuildResult<T> = Result<T, Diagnostic>;

/* ===================== Public API ===================== */

/// Parse snippet source into lowered top-level statements
pub fn parse_program(source: &str, target: ScriptTarget) -> BuildResult<Vec<Stmt>> {
    let pairs = ScriptParser::parse(Rule::program, source).map_err(syntax_error)?;
    let builder = Builder { target };

    let mut body = Vec::new();
    for program in pairs {
        for pair in program.into_inner() {
            if pair.as_rule() != Rule::EOI {
                body.push(builder.build_statement(pair)?);
            }
        }
    }
    Ok(body)
}

fn syntax_error(err: pest::error::Error<Rule>) -> Diagnostic {
    let (line, column) = match err.line_col {
        pest::error::LineColLocation::Pos(pos) => pos,
        pest::error::LineColLocation::Span(start, _) => start,
    };
    let err = err.renamed_rules(describe_rule);
    Diagnostic::at(format!("Syntax error: {}", err.variant.message()), line, column)
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::identifier | Rule::prop_ident => "identifier".to_string(),
        Rule::assign_op => "assignment operator".to_string(),
        other => {
            let name = format!("{:?}", other);
            name.trim_start_matches("kw_")
                .trim_end_matches("_stmt")
                .replace('_', " ")
        }
    }
}

/* ===================== Pair Helpers ===================== */

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_var
            | Rule::kw_let
            | Rule::kw_const
            | Rule::kw_function
            | Rule::kw_class
            | Rule::kw_abstract
            | Rule::kw_extends
            | Rule::kw_implements
            | Rule::kw_interface
            | Rule::kw_type
            | Rule::kw_enum
            | Rule::kw_declare
            | Rule::kw_export
            | Rule::kw_default
            | Rule::kw_import
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_of
            | Rule::kw_in
            | Rule::kw_while
            | Rule::kw_do
            | Rule::kw_switch
            | Rule::kw_case
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_finally
            | Rule::kw_return
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_throw
            | Rule::kw_new
            | Rule::kw_as
            | Rule::kw_typeof
            | Rule::kw_constructor
    )
}

fn error_at(pair: &Pair<'_, Rule>, message: impl Into<String>) -> Diagnostic {
    let (line, column) = pair.line_col();
    Diagnostic::at(message, line, column)
}

/// Meaningful children of a node, keyword tokens removed
struct Parts<'i> {
    rule: Rule,
    at: (usize, usize),
    inner: Peekable<IntoIter<Pair<'i, Rule>>>,
}

impl<'i> Parts<'i> {
    fn of(pair: Pair<'i, Rule>) -> Self {
        let rule = pair.as_rule();
        let at = pair.line_col();
        let children: Vec<_> = pair
            .into_inner()
            .filter(|child| !is_keyword(child.as_rule()))
            .collect();
        Self {
            rule,
            at,
            inner: children.into_iter().peekable(),
        }
    }

    fn peek_rule(&mut self) -> Option<Rule> {
        self.inner.peek().map(|pair| pair.as_rule())
    }

    /// Next child, which the grammar guarantees is present
    fn expect(&mut self) -> BuildResult<Pair<'i, Rule>> {
        self.inner.next().ok_or_else(|| {
            Diagnostic::at(
                format!("Incomplete {}", describe_rule(&self.rule)),
                self.at.0,
                self.at.1,
            )
        })
    }

    fn take_rule(&mut self, rule: Rule) -> Option<Pair<'i, Rule>> {
        if self.peek_rule() == Some(rule) {
            self.inner.next()
        } else {
            None
        }
    }

    fn skip_rule(&mut self, rule: Rule) {
        while self.take_rule(rule).is_some() {}
    }

    fn modifiers(&mut self) -> Vec<String> {
        let mut modifiers = Vec::new();
        while let Some(modifier) = self.take_rule(Rule::member_modifier) {
            modifiers.push(modifier.as_str().to_string());
        }
        modifiers
    }
}

impl<'i> Iterator for Parts<'i> {
    type Item = Pair<'i, Rule>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// First meaningful child
fn only(pair: Pair<'_, Rule>) -> BuildResult<Pair<'_, Rule>> {
    Parts::of(pair).expect()
}

/* ===================== AST Builder ===================== */

struct Builder {
    target: ScriptTarget,
}

/// Parameters plus the names declared as constructor parameter properties
struct ParamList {
    params: Vec<Param>,
    properties: Vec<String>,
}

impl Builder {
    fn build_statements(&self, pair: Pair<'_, Rule>) -> BuildResult<Vec<Stmt>> {
        Parts::of(pair)
            .map(|stmt| self.build_statement(stmt))
            .collect()
    }

    fn build_statement(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        match pair.as_rule() {
            Rule::empty_stmt | Rule::interface_decl | Rule::type_alias | Rule::declare_stmt => {
                Ok(Stmt::Empty)
            }
            Rule::block => Ok(Stmt::Block(self.build_statements(pair)?)),
            Rule::var_decl_stmt => self.build_var_decl(only(pair)?),
            Rule::function_decl => self.build_function_decl(pair),
            Rule::class_decl => Ok(Stmt::Class(Arc::new(self.build_class(pair)?))),
            Rule::enum_decl => self.build_enum(pair),
            // export modifiers are dropped: a snippet is a script, not a module
            Rule::export_decl => self.build_statement(only(pair)?),
            Rule::import_decl => Err(error_at(
                &pair,
                "Cannot use import statement outside a module",
            )),
            Rule::if_stmt => {
                let mut parts = Parts::of(pair);
                let test = self.build_expression(parts.expect()?)?;
                let then_s = Box::new(self.build_statement(parts.expect()?)?);
                let else_s = match parts.next() {
                    Some(alt) => Some(Box::new(self.build_statement(alt)?)),
                    None => None,
                };
                Ok(Stmt::If { test, then_s, else_s })
            }
            Rule::while_stmt => {
                let mut parts = Parts::of(pair);
                let test = self.build_expression(parts.expect()?)?;
                let body = Box::new(self.build_statement(parts.expect()?)?);
                Ok(Stmt::While { test, body })
            }
            Rule::do_while_stmt => {
                let mut parts = Parts::of(pair);
                let body = Box::new(self.build_statement(parts.expect()?)?);
                let test = self.build_expression(parts.expect()?)?;
                Ok(Stmt::DoWhile { body, test })
            }
            Rule::for_stmt => self.build_for(pair),
            Rule::switch_stmt => self.build_switch(pair),
            Rule::try_stmt => self.build_try(pair),
            Rule::return_stmt => {
                let value = match Parts::of(pair).next() {
                    Some(expr) => Some(self.build_expression(expr)?),
                    None => None,
                };
                Ok(Stmt::Return(value))
            }
            Rule::break_stmt => Ok(Stmt::Break),
            Rule::continue_stmt => Ok(Stmt::Continue),
            Rule::throw_stmt => Ok(Stmt::Throw(self.build_expression(only(pair)?)?)),
            Rule::expr_stmt => Ok(Stmt::Expr(self.build_expression(only(pair)?)?)),
            other => Err(error_at(
                &pair,
                format!("Unexpected {}", describe_rule(&other)),
            )),
        }
    }

    /* --------------------- Declarations --------------------- */

    fn build_var_decl(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        let mut parts = Parts::of(pair);
        let kind = build_decl_kind(&parts.expect()?);
        let decls = parts
            .map(|declarator| self.build_declarator(declarator))
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Stmt::Decl { kind, decls })
    }

    fn build_declarator(&self, pair: Pair<'_, Rule>) -> BuildResult<Declarator> {
        let mut parts = Parts::of(pair);
        let target = self.build_binding(parts.expect()?)?;
        parts.skip_rule(Rule::type_annotation);
        let init = match parts.next() {
            Some(expr) => Some(self.build_expression(expr)?),
            None => None,
        };
        Ok(Declarator { target, init })
    }

    fn build_binding(&self, pair: Pair<'_, Rule>) -> BuildResult<Pattern> {
        match pair.as_rule() {
            Rule::identifier => Ok(Pattern::Ident(pair.as_str().to_string())),
            Rule::array_pattern => {
                let items: Vec<_> = Parts::of(pair).collect();
                let count = items.len();
                let mut elements = Vec::new();
                let mut rest = None;

                for (i, item) in items.into_iter().enumerate() {
                    let at = item.line_col();
                    let mut parts = Parts::of(item);
                    let spread = parts.take_rule(Rule::spread_marker).is_some();
                    let target = self.build_binding(parts.expect()?)?;
                    let default = match parts.next() {
                        Some(expr) => Some(self.build_expression(expr)?),
                        None => None,
                    };

                    if spread {
                        if i + 1 != count || default.is_some() {
                            return Err(Diagnostic::at(
                                "Rest element must be last element",
                                at.0,
                                at.1,
                            ));
                        }
                        rest = Some(Box::new(target));
                    } else {
                        elements.push(PatternElem { target, default });
                    }
                }
                Ok(Pattern::Array { elements, rest })
            }
            Rule::object_pattern => {
                let mut props = Vec::new();
                let mut rest = None;

                for prop in Parts::of(pair) {
                    let mut parts = Parts::of(prop);
                    match parts.peek_rule() {
                        Some(Rule::spread_marker) => {
                            parts.expect()?;
                            rest = Some(parts.expect()?.as_str().to_string());
                        }
                        Some(Rule::property_name) => {
                            let key = self.build_prop_key(parts.expect()?)?;
                            let target = self.build_binding(parts.expect()?)?;
                            let default = match parts.next() {
                                Some(expr) => Some(self.build_expression(expr)?),
                                None => None,
                            };
                            props.push(PatternProp { key, target, default });
                        }
                        _ => {
                            let name = parts.expect()?.as_str().to_string();
                            let default = match parts.next() {
                                Some(expr) => Some(self.build_expression(expr)?),
                                None => None,
                            };
                            props.push(PatternProp {
                                key: PropKey::Named(name.clone()),
                                target: Pattern::Ident(name),
                                default,
                            });
                        }
                    }
                }
                Ok(Pattern::Object { props, rest })
            }
            _ => Err(error_at(&pair, "Invalid destructuring assignment target")),
        }
    }

    fn build_params(&self, pair: Pair<'_, Rule>) -> BuildResult<ParamList> {
        let items: Vec<_> = Parts::of(pair).collect();
        let count = items.len();
        let mut params = Vec::new();
        let mut properties = Vec::new();

        for (i, item) in items.into_iter().enumerate() {
            let at = item.line_col();
            let mut parts = Parts::of(item);
            let modifiers = parts.modifiers();
            let rest = parts.take_rule(Rule::spread_marker).is_some();
            let target = self.build_binding(parts.expect()?)?;
            parts.skip_rule(Rule::type_annotation);
            let default = match parts.next() {
                Some(expr) => Some(self.build_expression(expr)?),
                None => None,
            };

            if rest && i + 1 != count {
                return Err(Diagnostic::at(
                    "Rest parameter must be last formal parameter",
                    at.0,
                    at.1,
                ));
            }
            // `this: T` only types the receiver
            if matches!(&target, Pattern::Ident(name) if name == "this") {
                continue;
            }
            if !modifiers.is_empty() {
                match &target {
                    Pattern::Ident(name) => properties.push(name.clone()),
                    _ => {
                        return Err(Diagnostic::at(
                            "A parameter property may not be declared using a binding pattern.",
                            at.0,
                            at.1,
                        ))
                    }
                }
            }
            params.push(Param { target, default, rest });
        }

        Ok(ParamList { params, properties })
    }

    /// Parameters of anything but a constructor
    fn build_plain_params(&self, pair: Pair<'_, Rule>) -> BuildResult<Vec<Param>> {
        let at = pair.line_col();
        let list = self.build_params(pair)?;
        if !list.properties.is_empty() {
            return Err(Diagnostic::at(
                "A parameter property is only allowed in a constructor implementation.",
                at.0,
                at.1,
            ));
        }
        Ok(list.params)
    }

    fn build_function_decl(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        let mut parts = Parts::of(pair);
        let name = parts.expect()?.as_str().to_string();
        parts.skip_rule(Rule::type_params);
        let params = self.build_plain_params(parts.expect()?)?;
        parts.skip_rule(Rule::type_annotation);

        match parts.take_rule(Rule::function_body) {
            Some(body) => Ok(Stmt::Function(Arc::new(FunctionDef {
                name: Some(name),
                params,
                body: self.build_statements(body)?,
                is_arrow: false,
            }))),
            // overload signature
            None => Ok(Stmt::Empty),
        }
    }

    fn build_function_expr(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut parts = Parts::of(pair);
        let name = parts
            .take_rule(Rule::identifier)
            .map(|ident| ident.as_str().to_string());
        parts.skip_rule(Rule::type_params);
        let params = self.build_plain_params(parts.expect()?)?;
        parts.skip_rule(Rule::type_annotation);
        let body = self.build_statements(parts.expect()?)?;

        Ok(Expr::Function(Arc::new(FunctionDef {
            name,
            params,
            body,
            is_arrow: false,
        })))
    }

    fn build_arrow(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut parts = Parts::of(pair);
        let head = parts.expect()?;
        let params = if head.as_rule() == Rule::identifier {
            vec![Param {
                target: Pattern::Ident(head.as_str().to_string()),
                default: None,
                rest: false,
            }]
        } else {
            self.build_plain_params(head)?
        };
        parts.skip_rule(Rule::type_annotation);

        let body = parts.expect()?;
        let body = if body.as_rule() == Rule::function_body {
            self.build_statements(body)?
        } else {
            vec![Stmt::Return(Some(self.build_expression(body)?))]
        };

        Ok(Expr::Function(Arc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
        })))
    }

    fn build_class(&self, pair: Pair<'_, Rule>) -> BuildResult<ClassDef> {
        let at = pair.line_col();
        let mut parts = Parts::of(pair);
        let name = parts.expect()?.as_str().to_string();
        parts.skip_rule(Rule::type_params);
        let parent = match parts.take_rule(Rule::class_extends) {
            Some(extends) => Some(self.build_expression(only(extends)?)?),
            None => None,
        };
        parts.skip_rule(Rule::class_implements);
        let body = parts.expect()?;

        let mut constructor: Option<(ParamList, Vec<Stmt>)> = None;
        let mut initializers = Vec::new();
        let mut statics = Vec::new();
        let mut methods = Vec::new();

        for member in Parts::of(body) {
            let member_at = member.line_col();
            let rule = member.as_rule();
            let mut parts = Parts::of(member);
            let modifiers = parts.modifiers();
            let is_static = modifiers.iter().any(|m| m == "static");

            match rule {
                Rule::constructor_def => {
                    let params = self.build_params(parts.expect()?)?;
                    if let Some(body) = parts.take_rule(Rule::function_body) {
                        if constructor.is_some() {
                            return Err(Diagnostic::at(
                                "Multiple constructor implementations are not allowed.",
                                member_at.0,
                                member_at.1,
                            ));
                        }
                        constructor = Some((params, self.build_statements(body)?));
                    }
                }
                Rule::accessor_def => {
                    let kind = match parts.expect()?.as_str() {
                        "get" => MethodKind::Getter,
                        _ => MethodKind::Setter,
                    };
                    let key = self.build_prop_key(parts.expect()?)?;
                    let params = self.build_plain_params(parts.expect()?)?;
                    parts.skip_rule(Rule::type_annotation);
                    let body = self.build_statements(parts.expect()?)?;
                    methods.push(MethodDef {
                        func: Arc::new(FunctionDef {
                            name: key_name(&key),
                            params,
                            body,
                            is_arrow: false,
                        }),
                        key,
                        kind,
                        is_static,
                    });
                }
                Rule::method_def => {
                    let key = self.build_prop_key(parts.expect()?)?;
                    parts.skip_rule(Rule::type_params);
                    let params = self.build_plain_params(parts.expect()?)?;
                    parts.skip_rule(Rule::type_annotation);
                    // abstract members and overloads have no body
                    if let Some(body) = parts.take_rule(Rule::function_body) {
                        methods.push(MethodDef {
                            func: Arc::new(FunctionDef {
                                name: key_name(&key),
                                params,
                                body: self.build_statements(body)?,
                                is_arrow: false,
                            }),
                            key,
                            kind: MethodKind::Method,
                            is_static,
                        });
                    }
                }
                Rule::field_def => {
                    if modifiers.iter().any(|m| m == "declare" || m == "abstract") {
                        continue;
                    }
                    let key = self.build_prop_key(parts.expect()?)?;
                    parts.skip_rule(Rule::type_annotation);
                    let value = match parts.next() {
                        Some(expr) => Some(self.build_expression(expr)?),
                        None => None,
                    };

                    if is_static {
                        statics.push(FieldDef { key, value });
                    } else if let Some(value) = value {
                        initializers.push(Stmt::Expr(Expr::assign(
                            Pattern::Target(Box::new(this_member(key))),
                            value,
                        )));
                    }
                }
                _ => {}
            }
        }

        let derived = parent.is_some();
        let (params, properties, mut ctor_body) = match constructor {
            Some((list, body)) => (list.params, list.properties, body),
            None if derived => (
                vec![Param {
                    target: Pattern::Ident("args".to_string()),
                    default: None,
                    rest: true,
                }],
                Vec::new(),
                vec![Stmt::Expr(Expr::Call {
                    callee: Box::new(Expr::Super),
                    args: vec![Arg::Spread(Expr::ident("args"))],
                    optional: false,
                })],
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        // Parameter properties first, then field initializers, right after super()
        let mut prologue: Vec<Stmt> = properties
            .into_iter()
            .map(|name| {
                Stmt::Expr(Expr::assign(
                    Pattern::Target(Box::new(Expr::member(Expr::This, name.clone()))),
                    Expr::Ident(name),
                ))
            })
            .collect();
        prologue.extend(initializers);

        if !prologue.is_empty() {
            let index = if derived {
                match ctor_body.iter().position(is_super_call) {
                    Some(i) => i + 1,
                    None => {
                        return Err(Diagnostic::at(
                            "A 'super' call must be the first statement in the constructor to refer to 'super' or 'this' when a derived class contains initialized properties or parameter properties.",
                            at.0,
                            at.1,
                        ))
                    }
                }
            } else {
                0
            };
            ctor_body.splice(index..index, prologue);
        }

        Ok(ClassDef {
            constructor: Arc::new(FunctionDef {
                name: Some(name.clone()),
                params,
                body: ctor_body,
                is_arrow: false,
            }),
            name,
            parent,
            statics,
            methods,
        })
    }

    /// `enum E { A, B = 5 }` becomes a block that fills a `var E` object
    /// with forward and numeric reverse mappings
    fn build_enum(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        let mut parts = Parts::of(pair);
        let name = parts.expect()?.as_str().to_string();
        let enum_ref = || Expr::ident(name.clone());

        let mut body = vec![Stmt::Decl {
            kind: DeclKind::Var,
            decls: vec![Declarator {
                target: Pattern::Ident(name.clone()),
                init: Some(Expr::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(enum_ref()),
                    right: Box::new(Expr::Object(Vec::new())),
                }),
            }],
        }];

        let mut members: Vec<String> = Vec::new();
        let mut next_value = Some(0.0);

        for member in parts {
            let at = member.line_col();
            let mut member_parts = Parts::of(member);
            let key = match self.build_prop_key(member_parts.expect()?)? {
                PropKey::Named(key) => key,
                PropKey::Computed(_) => {
                    return Err(Diagnostic::at(
                        "Computed property names are not allowed in enums.",
                        at.0,
                        at.1,
                    ))
                }
            };

            let value = match member_parts.next() {
                Some(init) => {
                    let init = qualify_members(self.build_expression(init)?, &name, &members);
                    next_value = match &init {
                        Expr::Num(n) => Some(n + 1.0),
                        Expr::Unary { op: UnaryOp::Neg, arg } => match **arg {
                            Expr::Num(n) => Some(1.0 - n),
                            _ => None,
                        },
                        _ => None,
                    };
                    init
                }
                None => match next_value {
                    Some(n) => {
                        next_value = Some(n + 1.0);
                        Expr::Num(n)
                    }
                    None => {
                        return Err(Diagnostic::at(
                            "Enum member must have initializer.",
                            at.0,
                            at.1,
                        ))
                    }
                },
            };

            let forward = Expr::assign(
                Pattern::Target(Box::new(Expr::index(enum_ref(), Expr::Str(key.clone())))),
                value.clone(),
            );
            let stmt = if matches!(value, Expr::Str(_)) {
                forward
            } else {
                Expr::assign(
                    Pattern::Target(Box::new(Expr::index(enum_ref(), forward))),
                    Expr::Str(key.clone()),
                )
            };
            body.push(Stmt::Expr(stmt));
            members.push(key);
        }

        Ok(Stmt::Block(body))
    }

    /* --------------------- Control Flow --------------------- */

    fn build_for(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        let mut parts = Parts::of(pair);
        let head = parts.expect()?;
        let body = Box::new(self.build_statement(parts.expect()?)?);

        match head.as_rule() {
            Rule::for_of_head | Rule::for_in_head => {
                let is_of = head.as_rule() == Rule::for_of_head;
                let mut head_parts = Parts::of(head);
                let kind = build_decl_kind(&head_parts.expect()?);
                let target = self.build_binding(head_parts.expect()?)?;
                head_parts.skip_rule(Rule::type_annotation);
                let subject = self.build_expression(head_parts.expect()?)?;

                if is_of {
                    Ok(Stmt::ForOf { kind, target, iterable: subject, body })
                } else {
                    Ok(Stmt::ForIn { kind, target, object: subject, body })
                }
            }
            _ => {
                let mut init = None;
                let mut test = None;
                let mut update = None;

                for clause in Parts::of(head) {
                    match clause.as_rule() {
                        Rule::for_init => {
                            let inner = only(clause)?;
                            let stmt = if inner.as_rule() == Rule::var_decl {
                                self.build_var_decl(inner)?
                            } else {
                                Stmt::Expr(self.build_expression(inner)?)
                            };
                            init = Some(Box::new(stmt));
                        }
                        Rule::for_test => test = Some(self.build_expression(only(clause)?)?),
                        Rule::for_update => update = Some(self.build_expression(only(clause)?)?),
                        _ => {}
                    }
                }

                Ok(Stmt::For { init, test, update, body })
            }
        }
    }

    fn build_switch(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        let mut parts = Parts::of(pair);
        let discriminant = self.build_expression(parts.expect()?)?;

        let mut cases = Vec::new();
        for case in parts {
            let mut case_parts = Parts::of(case);
            let label = case_parts.expect()?;
            let test = match label.as_rule() {
                Rule::case_label => Some(self.build_expression(only(label)?)?),
                _ => None,
            };
            let body = case_parts
                .map(|stmt| self.build_statement(stmt))
                .collect::<BuildResult<Vec<_>>>()?;
            cases.push(SwitchCase { test, body });
        }

        Ok(Stmt::Switch { discriminant, cases })
    }

    fn build_try(&self, pair: Pair<'_, Rule>) -> BuildResult<Stmt> {
        let at = pair.line_col();
        let mut parts = Parts::of(pair);
        let block = self.build_statements(parts.expect()?)?;

        let mut param = None;
        let mut handler = None;
        let mut finalizer = None;

        for clause in parts {
            match clause.as_rule() {
                Rule::catch_clause => {
                    let mut clause_parts = Parts::of(clause);
                    if clause_parts.peek_rule() != Some(Rule::block) {
                        param = Some(self.build_binding(clause_parts.expect()?)?);
                        clause_parts.skip_rule(Rule::type_annotation);
                    }
                    handler = Some(self.build_statements(clause_parts.expect()?)?);
                }
                Rule::finally_clause => {
                    finalizer = Some(self.build_statements(only(clause)?)?);
                }
                _ => {}
            }
        }

        if handler.is_none() && finalizer.is_none() {
            return Err(Diagnostic::at("Missing catch or finally after try", at.0, at.1));
        }

        Ok(Stmt::Try { block, param, handler, finalizer })
    }

    /* --------------------- Expressions --------------------- */

    fn build_expression(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        match pair.as_rule() {
            Rule::expression => {
                let mut exprs = Parts::of(pair)
                    .map(|expr| self.build_expression(expr))
                    .collect::<BuildResult<Vec<_>>>()?;
                if exprs.len() == 1 {
                    Ok(exprs.remove(0))
                } else {
                    Ok(Expr::Seq(exprs))
                }
            }
            Rule::assignment_expr => self.build_assignment(pair),
            Rule::arrow_function => self.build_arrow(pair),
            Rule::conditional_expr => {
                let mut parts = Parts::of(pair);
                let test = self.build_expression(parts.expect()?)?;
                if parts.take_rule(Rule::question).is_none() {
                    return Ok(test);
                }
                let cons = self.build_expression(parts.expect()?)?;
                let alt = self.build_expression(parts.expect()?)?;
                Ok(Expr::Cond {
                    test: Box::new(test),
                    cons: Box::new(cons),
                    alt: Box::new(alt),
                })
            }
            Rule::nullish_expr
            | Rule::or_expr
            | Rule::and_expr
            | Rule::bitor_expr
            | Rule::bitxor_expr
            | Rule::bitand_expr
            | Rule::equality_expr
            | Rule::relational_expr
            | Rule::shift_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr => self.build_binary_chain(pair),
            Rule::exponent_expr => {
                let mut parts = Parts::of(pair);
                let base = self.build_expression(parts.expect()?)?;
                if parts.take_rule(Rule::op_exponent).is_none() {
                    return Ok(base);
                }
                let exponent = self.build_expression(parts.expect()?)?;
                Ok(self.power(base, exponent))
            }
            Rule::unary_expr => self.build_unary(pair),
            Rule::postfix_expr => {
                let mut parts = Parts::of(pair);
                let operand_pair = parts.expect()?;
                let at = operand_pair.line_col();
                let operand = self.build_expression(operand_pair)?;
                match parts.take_rule(Rule::postfix_op) {
                    Some(op) => Ok(Expr::Update {
                        op: update_op(op.as_str()),
                        prefix: false,
                        target: Box::new(update_target(
                            operand,
                            at,
                            "Invalid left-hand side expression in postfix operation",
                        )?),
                    }),
                    None => Ok(operand),
                }
            }
            Rule::call_member_expr => self.build_call_member(pair),
            Rule::new_expr => {
                let mut parts = Parts::of(pair);
                let mut callee_parts = Parts::of(parts.expect()?);
                let mut callee = self.build_expression(callee_parts.expect()?)?;
                for suffix in callee_parts {
                    callee = Expr::member(callee, only(suffix)?.as_str());
                }
                parts.skip_rule(Rule::type_args);
                let args = match parts.next() {
                    Some(args) => self.build_arguments(args)?,
                    None => Vec::new(),
                };
                Ok(Expr::New {
                    callee: Box::new(callee),
                    args,
                })
            }
            Rule::paren_expr => self.build_expression(only(pair)?),
            Rule::array_lit => {
                let elements = Parts::of(pair)
                    .map(|elem| self.build_argument(elem))
                    .collect::<BuildResult<Vec<_>>>()?;
                Ok(Expr::Array(elements))
            }
            Rule::object_lit => self.build_object(pair),
            Rule::function_expr => self.build_function_expr(pair),
            Rule::template_lit => self.build_template(pair),
            Rule::string_lit => Ok(Expr::Str(build_string(pair)?)),
            Rule::number_lit => Ok(Expr::Num(build_number(&pair)?)),
            Rule::bool_lit => Ok(Expr::Bool(pair.as_str() == "true")),
            Rule::null_lit => Ok(Expr::Null),
            Rule::this_expr => Ok(Expr::This),
            Rule::super_expr => Ok(Expr::Super),
            Rule::identifier => Ok(Expr::Ident(pair.as_str().to_string())),
            Rule::async_syntax => Err(error_at(
                &pair,
                "async functions and await are not supported",
            )),
            other => Err(error_at(
                &pair,
                format!("Unexpected {}", describe_rule(&other)),
            )),
        }
    }

    fn build_assignment(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut parts = Parts::of(pair);
        let left_pair = parts.expect()?;
        let at = left_pair.line_col();
        let left = self.build_expression(left_pair)?;

        let op_pair = match parts.take_rule(Rule::assign_op) {
            Some(op) => op,
            None => return Ok(left),
        };
        let value = self.build_expression(parts.expect()?)?;
        let op = assign_op(op_pair.as_str())
            .ok_or_else(|| error_at(&op_pair, "Unknown assignment operator"))?;

        let target = match op {
            AssignOp::Assign => to_pattern(left, at)?,
            _ => simple_target(left, at)?,
        };

        if op == AssignOp::Compound(BinaryOp::Pow) && self.target < ScriptTarget::Es2016 {
            if let Pattern::Ident(name) = &target {
                let current = Expr::Ident(name.clone());
                return Ok(Expr::assign(target, self.power(current, value)));
            }
        }

        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn build_binary_chain(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut parts = Parts::of(pair);
        let mut left = self.build_expression(parts.expect()?)?;

        while let Some(op_pair) = parts.next() {
            // `expr as Type`
            if op_pair.as_rule() == Rule::type_expr {
                continue;
            }
            let right = self.build_expression(parts.expect()?)?;
            left = match op_pair.as_str() {
                "??" => logical(LogicalOp::Nullish, left, right),
                "||" => logical(LogicalOp::Or, left, right),
                "&&" => logical(LogicalOp::And, left, right),
                symbol => Expr::Binary {
                    op: binary_op(symbol)
                        .ok_or_else(|| error_at(&op_pair, format!("Unknown operator '{}'", symbol)))?,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn build_unary(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut parts = Parts::of(pair);
        let mut ops = Vec::new();
        while let Some(op) = parts.take_rule(Rule::unary_op) {
            ops.push(op.as_str().to_string());
        }
        let operand_pair = parts.expect()?;
        let at = operand_pair.line_col();
        let mut expr = self.build_expression(operand_pair)?;

        for op in ops.iter().rev() {
            expr = match op.as_str() {
                "++" | "--" => Expr::Update {
                    op: update_op(op),
                    prefix: true,
                    target: Box::new(update_target(
                        expr,
                        at,
                        "Invalid left-hand side expression in prefix operation",
                    )?),
                },
                symbol => Expr::Unary {
                    op: match symbol {
                        "!" => UnaryOp::Not,
                        "-" => UnaryOp::Neg,
                        "+" => UnaryOp::Plus,
                        "~" => UnaryOp::BitNot,
                        "typeof" => UnaryOp::TypeOf,
                        "void" => UnaryOp::Void,
                        _ => UnaryOp::Delete,
                    },
                    arg: Box::new(expr),
                },
            };
        }

        Ok(expr)
    }

    fn build_call_member(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut parts = Parts::of(pair);
        let mut expr = self.build_expression(parts.expect()?)?;
        let mut chained = false;

        for suffix in parts {
            let rule = suffix.as_rule();
            let optional = matches!(
                rule,
                Rule::optional_member | Rule::optional_index | Rule::optional_call
            );
            chained |= optional;

            expr = match rule {
                Rule::member_suffix | Rule::optional_member => Expr::Member {
                    object: Box::new(expr),
                    property: only(suffix)?.as_str().to_string(),
                    optional,
                },
                Rule::index_suffix | Rule::optional_index => Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(self.build_expression(only(suffix)?)?),
                    optional,
                },
                Rule::call_suffix | Rule::optional_call => Expr::Call {
                    callee: Box::new(expr),
                    args: self.build_arguments(only(suffix)?)?,
                    optional,
                },
                // `value!` only asserts non-null to the type checker
                _ => expr,
            };
        }

        if chained {
            Ok(Expr::OptionalChain(Box::new(expr)))
        } else {
            Ok(expr)
        }
    }

    fn build_arguments(&self, pair: Pair<'_, Rule>) -> BuildResult<Vec<Arg>> {
        Parts::of(pair)
            .map(|arg| self.build_argument(arg))
            .collect()
    }

    fn build_argument(&self, pair: Pair<'_, Rule>) -> BuildResult<Arg> {
        let mut parts = Parts::of(pair);
        let spread = parts.take_rule(Rule::spread_marker).is_some();
        let value = self.build_expression(parts.expect()?)?;
        Ok(if spread { Arg::Spread(value) } else { Arg::Plain(value) })
    }

    fn build_object(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut props = Vec::new();

        for member in Parts::of(pair) {
            let rule = member.as_rule();
            let mut parts = Parts::of(member);
            let prop = match rule {
                Rule::spread_prop => {
                    parts.skip_rule(Rule::spread_marker);
                    ObjectProp::Spread(self.build_expression(parts.expect()?)?)
                }
                Rule::method_prop => {
                    let key = self.build_prop_key(parts.expect()?)?;
                    let params = self.build_plain_params(parts.expect()?)?;
                    parts.skip_rule(Rule::type_annotation);
                    let body = self.build_statements(parts.expect()?)?;
                    let func = FunctionDef {
                        name: key_name(&key),
                        params,
                        body,
                        is_arrow: false,
                    };
                    ObjectProp::KeyValue(key, Expr::Function(Arc::new(func)))
                }
                Rule::keyed_prop => {
                    let key = self.build_prop_key(parts.expect()?)?;
                    ObjectProp::KeyValue(key, self.build_expression(parts.expect()?)?)
                }
                _ => {
                    let name = parts.expect()?.as_str().to_string();
                    match parts.next() {
                        Some(default) => ObjectProp::CoverInit {
                            name,
                            default: Box::new(self.build_expression(default)?),
                        },
                        None => ObjectProp::KeyValue(
                            PropKey::Named(name.clone()),
                            Expr::Ident(name),
                        ),
                    }
                }
            };
            props.push(prop);
        }

        Ok(Expr::Object(props))
    }

    fn build_prop_key(&self, pair: Pair<'_, Rule>) -> BuildResult<PropKey> {
        let inner = only(pair)?;
        match inner.as_rule() {
            Rule::string_lit => Ok(PropKey::Named(build_string(inner)?)),
            Rule::number_lit => Ok(PropKey::Named(number_to_string(build_number(&inner)?))),
            Rule::computed_key => Ok(PropKey::Computed(Box::new(
                self.build_expression(only(inner)?)?,
            ))),
            _ => Ok(PropKey::Named(inner.as_str().to_string())),
        }
    }

    /// Template literals lower to string concatenation
    fn build_template(&self, pair: Pair<'_, Rule>) -> BuildResult<Expr> {
        let mut result = Expr::Str(String::new());

        for part in pair.into_inner() {
            let piece = match part.as_rule() {
                Rule::template_chunk => Expr::Str(
                    unescape(part.as_str()).map_err(|message| error_at(&part, message))?,
                ),
                _ => self.build_expression(only(part)?)?,
            };
            result = match (result, piece) {
                (Expr::Str(head), Expr::Str(tail)) => Expr::Str(head + &tail),
                (head, tail) => Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(head),
                    right: Box::new(tail),
                },
            };
        }

        Ok(result)
    }

    fn power(&self, base: Expr, exponent: Expr) -> Expr {
        if self.target < ScriptTarget::Es2016 {
            Expr::call(
                Expr::member(Expr::ident("Math"), "pow"),
                vec![base, exponent],
            )
        } else {
            Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            }
        }
    }
}

/* ===================== Lowering Helpers ===================== */

fn build_decl_kind(pair: &Pair<'_, Rule>) -> DeclKind {
    match pair.as_str() {
        "var" => DeclKind::Var,
        "let" => DeclKind::Let,
        _ => DeclKind::Const,
    }
}

fn build_string(pair: Pair<'_, Rule>) -> BuildResult<String> {
    let at = pair.line_col();
    let raw = pair
        .into_inner()
        .next()
        .map(|chars| chars.as_str())
        .unwrap_or("");
    unescape(raw).map_err(|message| Diagnostic::at(message, at.0, at.1))
}

fn build_number(pair: &Pair<'_, Rule>) -> BuildResult<f64> {
    let digits: String = pair.as_str().chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();

    let value = if let Some(hex) = lower.strip_prefix("0x") {
        parse_radix_digits(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        parse_radix_digits(bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        parse_radix_digits(oct, 8)
    } else {
        digits.parse::<f64>().ok()
    };

    value.ok_or_else(|| error_at(pair, format!("Invalid number '{}'", pair.as_str())))
}

/// Resolve escape sequences of a string or template chunk
pub fn unescape(raw: &str) -> Result<String, String> {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut buf = [0u16; 2];
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            units.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }

        let escaped = chars
            .next()
            .ok_or_else(|| "Invalid or unexpected token".to_string())?;
        match escaped {
            'n' => units.push(0x0A),
            't' => units.push(0x09),
            'r' => units.push(0x0D),
            'b' => units.push(0x08),
            'f' => units.push(0x0C),
            'v' => units.push(0x0B),
            '0' => units.push(0x00),
            // line continuation
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let unit = (hex.len() == 2)
                    .then(|| u16::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .ok_or_else(|| "Invalid hexadecimal escape sequence".to_string())?;
                units.push(unit);
            }
            'u' => {
                let invalid = || "Invalid Unicode escape sequence".to_string();
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    let code = u32::from_str_radix(&hex, 16).map_err(|_| invalid())?;
                    let ch = char::from_u32(code).ok_or_else(invalid)?;
                    units.extend_from_slice(ch.encode_utf16(&mut buf));
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    if hex.len() != 4 {
                        return Err(invalid());
                    }
                    units.push(u16::from_str_radix(&hex, 16).map_err(|_| invalid())?);
                }
            }
            other => units.extend_from_slice(other.encode_utf16(&mut buf)),
        }
    }

    Ok(String::from_utf16_lossy(&units))
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn binary_op(symbol: &str) -> Option<BinaryOp> {
    Some(match symbol {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "**" => BinaryOp::Pow,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::NotEq,
        "===" => BinaryOp::StrictEq,
        "!==" => BinaryOp::StrictNotEq,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::LtEq,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::GtEq,
        "&" => BinaryOp::BitAnd,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        ">>>" => BinaryOp::UShr,
        "instanceof" => BinaryOp::InstanceOf,
        "in" => BinaryOp::In,
        _ => return None,
    })
}

fn assign_op(symbol: &str) -> Option<AssignOp> {
    let operator = symbol.strip_suffix('=')?;
    Some(match operator {
        "" => AssignOp::Assign,
        "&&" => AssignOp::Logical(LogicalOp::And),
        "||" => AssignOp::Logical(LogicalOp::Or),
        "??" => AssignOp::Logical(LogicalOp::Nullish),
        other => AssignOp::Compound(binary_op(other)?),
    })
}

fn update_op(symbol: &str) -> UpdateOp {
    if symbol == "++" {
        UpdateOp::Inc
    } else {
        UpdateOp::Dec
    }
}

fn invalid_target(at: (usize, usize), message: &str) -> Diagnostic {
    Diagnostic::at(message, at.0, at.1)
}

fn update_target(expr: Expr, at: (usize, usize), message: &str) -> BuildResult<Expr> {
    match expr {
        Expr::Ident(_)
        | Expr::Member { optional: false, .. }
        | Expr::Index { optional: false, .. } => Ok(expr),
        _ => Err(invalid_target(at, message)),
    }
}

fn simple_target(expr: Expr, at: (usize, usize)) -> BuildResult<Pattern> {
    match expr {
        Expr::Ident(name) => Ok(Pattern::Ident(name)),
        Expr::Member { optional: false, .. } | Expr::Index { optional: false, .. } => {
            Ok(Pattern::Target(Box::new(expr)))
        }
        _ => Err(invalid_target(at, "Invalid left-hand side in assignment")),
    }
}

/// Reinterpret an array/object literal on the left of `=` as a pattern
fn to_pattern(expr: Expr, at: (usize, usize)) -> BuildResult<Pattern> {
    match expr {
        Expr::Array(items) => {
            let count = items.len();
            let mut elements = Vec::new();
            let mut rest = None;
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Arg::Spread(target) if i + 1 == count => {
                        rest = Some(Box::new(to_pattern(target, at)?));
                    }
                    Arg::Spread(_) => {
                        return Err(invalid_target(at, "Rest element must be last element"))
                    }
                    Arg::Plain(target) => elements.push(to_pattern_elem(target, at)?),
                }
            }
            Ok(Pattern::Array { elements, rest })
        }
        Expr::Object(members) => {
            let mut props = Vec::new();
            let mut rest = None;
            for member in members {
                match member {
                    ObjectProp::KeyValue(key, value) => {
                        let PatternElem { target, default } = to_pattern_elem(value, at)?;
                        props.push(PatternProp { key, target, default });
                    }
                    ObjectProp::CoverInit { name, default } => props.push(PatternProp {
                        key: PropKey::Named(name.clone()),
                        target: Pattern::Ident(name),
                        default: Some(*default),
                    }),
                    ObjectProp::Spread(Expr::Ident(name)) => rest = Some(name),
                    ObjectProp::Spread(_) => {
                        return Err(invalid_target(at, "Invalid destructuring assignment target"))
                    }
                }
            }
            Ok(Pattern::Object { props, rest })
        }
        other => simple_target(other, at),
    }
}

fn to_pattern_elem(expr: Expr, at: (usize, usize)) -> BuildResult<PatternElem> {
    match expr {
        Expr::Assign {
            op: AssignOp::Assign,
            target,
            value,
        } => Ok(PatternElem {
            target: *target,
            default: Some(*value),
        }),
        other => Ok(PatternElem {
            target: to_pattern(other, at)?,
            default: None,
        }),
    }
}

fn this_member(key: PropKey) -> Expr {
    match key {
        PropKey::Named(name) => Expr::member(Expr::This, name),
        PropKey::Computed(index) => Expr::index(Expr::This, *index),
    }
}

fn key_name(key: &PropKey) -> Option<String> {
    match key {
        PropKey::Named(name) => Some(name.clone()),
        PropKey::Computed(_) => None,
    }
}

fn is_super_call(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Expr(Expr::Call { callee, .. }) if matches!(**callee, Expr::Super))
}

/// Earlier enum members referenced by bare name resolve through the enum object
fn qualify_members(expr: Expr, enum_name: &str, members: &[String]) -> Expr {
    let qualify = |inner: Box<Expr>| Box::new(qualify_members(*inner, enum_name, members));
    match expr {
        Expr::Ident(name) if members.contains(&name) => {
            Expr::member(Expr::ident(enum_name), name)
        }
        Expr::Unary { op, arg } => Expr::Unary { op, arg: qualify(arg) },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: qualify(left),
            right: qualify(right),
        },
        Expr::Logical { op, left, right } => Expr::Logical {
            op,
            left: qualify(left),
            right: qualify(right),
        },
        Expr::Cond { test, cons, alt } => Expr::Cond {
            test: qualify(test),
            cons: qualify(cons),
            alt: qualify(alt),
        },
        other => other,
    }
}
