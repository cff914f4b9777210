//! Parser tests - verify parsing, type erasure and lowering
//!
//! These tests check the AST the builder produces. They do NOT execute the
//! code; that's covered by the interpreter tests.

use crate::compiler::ScriptTarget;
use crate::script::ast::{
    Arg, AssignOp, BinaryOp, DeclKind, Declarator, Expr, LogicalOp, ObjectProp, Pattern, PropKey,
    Stmt,
};
use crate::script::parser::parse_program;

fn parse(source: &str) -> Vec<Stmt> {
    parse_program(source, ScriptTarget::Es2015).expect("Should parse")
}

fn parse_expr(source: &str) -> Expr {
    match parse(source).remove(0) {
        Stmt::Expr(expr) => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

/* ===================== Basic Parsing ===================== */

#[test]
fn test_parse_let_number() {
    let ast = parse("let x = 42;");
    assert_eq!(
        ast,
        vec![Stmt::Decl {
            kind: DeclKind::Let,
            decls: vec![Declarator {
                target: Pattern::Ident("x".to_string()),
                init: Some(Expr::Num(42.0)),
            }],
        }]
    );
}

#[test]
fn test_parse_number_forms() {
    assert_eq!(parse_expr("0xff;"), Expr::Num(255.0));
    assert_eq!(parse_expr("0b101;"), Expr::Num(5.0));
    assert_eq!(parse_expr("1_000_000;"), Expr::Num(1_000_000.0));
    assert_eq!(parse_expr(".5;"), Expr::Num(0.5));
    assert_eq!(parse_expr("1e3;"), Expr::Num(1000.0));
}

#[test]
fn test_parse_string_escapes() {
    assert_eq!(parse_expr(r#""a\nb";"#), Expr::Str("a\nb".to_string()));
    assert_eq!(parse_expr(r"'it\'s';"), Expr::Str("it's".to_string()));
    assert_eq!(parse_expr(r#""A\x42\u{1F600}";"#), Expr::Str("AB\u{1F600}".to_string()));
}

#[test]
fn test_statements_without_semicolons() {
    let ast = parse("let a = 1\nlet b = 2\nconsole.log(a + b)");
    assert_eq!(ast.len(), 3);
}

#[test]
fn test_comments_are_ignored() {
    let ast = parse("// leading\nlet a = 1; /* block */ a; // [!code highlight]");
    assert_eq!(ast.len(), 2);
}

/* ===================== Precedence ===================== */

#[test]
fn test_multiplication_binds_tighter() {
    let expr = parse_expr("1 + 2 * 3;");
    match expr {
        Expr::Binary { op: BinaryOp::Add, right, .. } => {
            assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("Expected Add at the root, got {:?}", other),
    }
}

#[test]
fn test_nullish_and_logical() {
    let expr = parse_expr("a ?? b || c;");
    assert!(matches!(expr, Expr::Logical { op: LogicalOp::Nullish, .. }));
}

#[test]
fn test_assignment_is_right_associative() {
    let expr = parse_expr("a = b = 1;");
    match expr {
        Expr::Assign { target, value, .. } => {
            assert_eq!(*target, Pattern::Ident("a".to_string()));
            assert!(matches!(*value, Expr::Assign { .. }));
        }
        other => panic!("Expected assignment, got {:?}", other),
    }
}

/* ===================== Type Erasure ===================== */

#[test]
fn test_type_annotations_are_erased() {
    let typed = parse(
        r#"
        interface Point { x: number; y: number }
        type Pair<T> = [T, T];
        declare const VERSION: string;
        function add(a: number, b: number = 2): number { return a + b; }
        let p = { x: 1, y: 2 } as Point;
        let n = p!.x;
        "#,
    );
    let untyped = parse(
        r#"
        ;
        ;
        ;
        function add(a, b = 2) { return a + b; }
        let p = { x: 1, y: 2 };
        let n = p.x;
        "#,
    );
    assert_eq!(typed, untyped);
}

#[test]
fn test_generic_function_and_overloads() {
    let ast = parse(
        r#"
        function first<T>(items: T[]): T;
        function first<T>(items: T[]): T | undefined { return items[0]; }
        "#,
    );
    assert_eq!(ast[0], Stmt::Empty);
    assert!(matches!(ast[1], Stmt::Function(_)));
}

#[test]
fn test_export_modifier_dropped() {
    assert_eq!(parse("export const a = 1;"), parse("const a = 1;"));
}

#[test]
fn test_import_rejected() {
    let err = parse_program("import { x } from './x';", ScriptTarget::Es2015).unwrap_err();
    assert_eq!(err.message, "Cannot use import statement outside a module");
    assert_eq!(err.position.map(|p| p.line), Some(1));
}

#[test]
fn test_async_and_await_rejected() {
    for source in [
        "async function f() { return 1 }",
        "const f = async () => 1;",
        "const g = async x => x;",
        "let v = await load();",
    ] {
        let err = parse_program(source, ScriptTarget::Es2015).unwrap_err();
        assert_eq!(err.message, "async functions and await are not supported", "{}", source);
    }
}

#[test]
fn test_async_and_await_as_identifiers() {
    assert!(parse_program("const async = 1; async(2); asyncTask();", ScriptTarget::Es2015).is_ok());
    assert!(parse_program("var await = 1; console.log(await);", ScriptTarget::Es2015).is_ok());
}

/* ===================== Lowering ===================== */

#[test]
fn test_template_literal_lowered_to_concatenation() {
    let expr = parse_expr("`a${x}b`;");
    let expected = Expr::Binary {
        op: BinaryOp::Add,
        left: Box::new(Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Str("a".to_string())),
            right: Box::new(Expr::Ident("x".to_string())),
        }),
        right: Box::new(Expr::Str("b".to_string())),
    };
    assert_eq!(expr, expected);
    assert_eq!(parse_expr("`plain`;"), Expr::Str("plain".to_string()));
}

#[test]
fn test_exponent_lowered_below_es2016() {
    let expr = parse_expr("2 ** 10;");
    assert_eq!(
        expr,
        Expr::call(
            Expr::member(Expr::ident("Math"), "pow"),
            vec![Expr::Num(2.0), Expr::Num(10.0)]
        )
    );

    let native = parse_program("2 ** 10;", ScriptTarget::EsNext).expect("Should parse");
    assert!(matches!(
        &native[0],
        Stmt::Expr(Expr::Binary { op: BinaryOp::Pow, .. })
    ));
}

#[test]
fn test_enum_lowered_to_object_block() {
    let ast = parse("enum Color { Red, Green = 5, Blue }");
    let body = match &ast[0] {
        Stmt::Block(body) => body,
        other => panic!("Expected block, got {:?}", other),
    };
    // var declaration plus one statement per member
    assert_eq!(body.len(), 4);
    assert!(matches!(&body[0], Stmt::Decl { kind: DeclKind::Var, .. }));

    // Blue follows Green = 5
    match &body[3] {
        Stmt::Expr(Expr::Assign { target, .. }) => match target.as_ref() {
            Pattern::Target(index) => match index.as_ref() {
                Expr::Index { index, .. } => match index.as_ref() {
                    Expr::Assign { value, .. } => assert_eq!(**value, Expr::Num(6.0)),
                    other => panic!("Expected forward assignment, got {:?}", other),
                },
                other => panic!("Expected index target, got {:?}", other),
            },
            other => panic!("Expected member target, got {:?}", other),
        },
        other => panic!("Expected reverse mapping, got {:?}", other),
    }
}

#[test]
fn test_enum_member_without_initializer_after_string() {
    let err = parse_program("enum E { A = 'a', B }", ScriptTarget::Es2015).unwrap_err();
    assert_eq!(err.message, "Enum member must have initializer.");
}

#[test]
fn test_parameter_properties_become_assignments() {
    let ast = parse(
        r#"
        class Point {
            constructor(public x: number, private readonly y: number) {}
        }
        "#,
    );
    let class = match &ast[0] {
        Stmt::Class(class) => class,
        other => panic!("Expected class, got {:?}", other),
    };
    assert_eq!(class.constructor.params.len(), 2);
    assert_eq!(class.constructor.body.len(), 2);
    assert_eq!(
        class.constructor.body[0],
        Stmt::Expr(Expr::assign(
            Pattern::Target(Box::new(Expr::member(Expr::This, "x"))),
            Expr::ident("x")
        ))
    );
}

#[test]
fn test_fields_follow_super_call() {
    let ast = parse(
        r#"
        class Base {}
        class Child extends Base {
            count = 1;
            constructor(name: string) {
                super();
                console.log(name);
            }
        }
        "#,
    );
    let class = match &ast[1] {
        Stmt::Class(class) => class,
        other => panic!("Expected class, got {:?}", other),
    };
    let body = &class.constructor.body;
    assert_eq!(body.len(), 3);
    assert!(matches!(&body[0], Stmt::Expr(Expr::Call { callee, .. }) if **callee == Expr::Super));
    assert!(matches!(&body[1], Stmt::Expr(Expr::Assign { .. })));
}

#[test]
fn test_default_derived_constructor_forwards_arguments() {
    let ast = parse("class A {} class B extends A {}");
    let class = match &ast[1] {
        Stmt::Class(class) => class,
        other => panic!("Expected class, got {:?}", other),
    };
    assert!(class.constructor.params[0].rest);
    assert_eq!(
        class.constructor.body,
        vec![Stmt::Expr(Expr::Call {
            callee: Box::new(Expr::Super),
            args: vec![Arg::Spread(Expr::ident("args"))],
            optional: false,
        })]
    );
}

#[test]
fn test_static_and_abstract_members() {
    let ast = parse(
        r#"
        abstract class Shape {
            static count = 0;
            abstract area(): number;
            describe() { return "shape"; }
        }
        "#,
    );
    let class = match &ast[0] {
        Stmt::Class(class) => class,
        other => panic!("Expected class, got {:?}", other),
    };
    assert_eq!(class.statics.len(), 1);
    assert_eq!(class.methods.len(), 1);
    assert_eq!(class.methods[0].key, PropKey::Named("describe".to_string()));
}

#[test]
fn test_arrow_expression_body_returns() {
    let expr = parse_expr("(a: number) => a * 2;");
    match expr {
        Expr::Function(func) => {
            assert!(func.is_arrow);
            assert!(matches!(func.body[0], Stmt::Return(Some(_))));
        }
        other => panic!("Expected arrow function, got {:?}", other),
    }
}

#[test]
fn test_object_shorthand_and_methods() {
    let expr = parse_expr("({ a, b: 2, c() { return 3; }, ...rest });");
    match expr {
        Expr::Object(props) => {
            assert_eq!(props.len(), 4);
            assert_eq!(
                props[0],
                ObjectProp::KeyValue(PropKey::Named("a".to_string()), Expr::ident("a"))
            );
            assert!(matches!(&props[2], ObjectProp::KeyValue(_, Expr::Function(_))));
            assert!(matches!(&props[3], ObjectProp::Spread(_)));
        }
        other => panic!("Expected object literal, got {:?}", other),
    }
}

#[test]
fn test_destructuring_assignment() {
    let expr = parse_expr("[a, b] = [b, a];");
    match expr {
        Expr::Assign { op: AssignOp::Assign, target, .. } => {
            assert!(matches!(*target, Pattern::Array { ref elements, .. } if elements.len() == 2));
        }
        other => panic!("Expected destructuring assignment, got {:?}", other),
    }
}

#[test]
fn test_optional_chain_wrapped() {
    let expr = parse_expr("a?.b.c;");
    match expr {
        Expr::OptionalChain(inner) => match *inner {
            Expr::Member { property, optional: false, object } => {
                assert_eq!(property, "c");
                assert!(matches!(*object, Expr::Member { optional: true, .. }));
            }
            other => panic!("Expected member access, got {:?}", other),
        },
        other => panic!("Expected optional chain, got {:?}", other),
    }
}

/* ===================== Errors ===================== */

#[test]
fn test_syntax_error_has_position() {
    let err = parse_program("let a = ;\n", ScriptTarget::Es2015).unwrap_err();
    assert!(err.message.starts_with("Syntax error"));
    let position = err.position.expect("Should carry a position");
    assert_eq!(position.line, 1);
}

#[test]
fn test_invalid_assignment_target() {
    let err = parse_program("1 = 2;", ScriptTarget::Es2015).unwrap_err();
    assert_eq!(err.message, "Invalid left-hand side in assignment");
}

#[test]
fn test_try_needs_handler() {
    let err = parse_program("try { a(); }", ScriptTarget::Es2015).unwrap_err();
    assert_eq!(err.message, "Missing catch or finally after try");
}
