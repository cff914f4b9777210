//! Declarations, scoping and literals

use super::helpers::{output, sloppy_output, thrown};

#[test]
fn test_let_const_var() {
    assert_eq!(
        output("var a = 1; let b = 2; const c = 3; console.log(a + b + c);"),
        "6"
    );
}

#[test]
fn test_var_hoisting() {
    assert_eq!(output("console.log(x); var x = 5; console.log(x);"), "undefined\n5");
}

#[test]
fn test_function_declaration_hoisting() {
    assert_eq!(
        output("console.log(twice(4)); function twice(n: number) { return n * 2; }"),
        "8"
    );
}

#[test]
fn test_temporal_dead_zone() {
    assert_eq!(
        thrown("console.log(value); let value = 1;"),
        "Cannot access 'value' before initialization"
    );
}

#[test]
fn test_const_assignment_throws() {
    assert_eq!(
        thrown("const limit = 1; limit = 2;"),
        "Assignment to constant variable."
    );
}

#[test]
fn test_block_scoping() {
    let source = r#"
        let x = 'outer';
        {
            let x = 'inner';
            console.log(x);
        }
        console.log(x);
    "#;
    assert_eq!(output(source), "inner\nouter");
}

#[test]
fn test_per_iteration_let_bindings() {
    let source = r#"
        const fns: Array<() => number> = [];
        for (let i = 0; i < 3; i++) {
            fns.push(() => i);
        }
        console.log(fns.map(f => f()).join(','));
    "#;
    assert_eq!(output(source), "0,1,2");
}

#[test]
fn test_template_literals() {
    let source = r#"
        const name = 'world';
        const n = 3;
        console.log(`hello ${name}, ${n + 1} times`);
    "#;
    assert_eq!(output(source), "hello world, 4 times");
}

#[test]
fn test_typeof_values() {
    let source = r#"
        console.log(typeof 1, typeof 'a', typeof true, typeof undefined,
            typeof null, typeof {}, typeof [], typeof (() => 1), typeof missing);
    "#;
    assert_eq!(
        output(source),
        "number string boolean undefined object object object function undefined"
    );
}

#[test]
fn test_destructuring() {
    let source = r#"
        const { a, b: renamed, c = 10, ...rest } = { a: 1, b: 2, d: 4, e: 5 };
        const [first, , third = 'x', ...others] = [1, 2, undefined, 4, 5];
        console.log(a, renamed, c, Object.keys(rest).join('|'));
        console.log(first, third, others.length);
    "#;
    assert_eq!(output(source), "1 2 10 d|e\n1 x 2");
}

#[test]
fn test_swap_by_destructuring_assignment() {
    assert_eq!(
        output("let a = 1, b = 2; [a, b] = [b, a]; console.log(a, b);"),
        "2 1"
    );
}

#[test]
fn test_type_only_declarations_vanish() {
    let source = r#"
        interface Shape { area(): number }
        type Pair<T> = [T, T];
        declare const external: number;
        const p: Pair<number> = [1, 2];
        console.log(p.length);
    "#;
    assert_eq!(output(source), "2");
}

#[test]
fn test_enum_forward_and_reverse_mapping() {
    let source = r#"
        enum Direction { Up, Down = 5, Left }
        console.log(Direction.Up, Direction.Left, Direction[5]);
    "#;
    assert_eq!(output(source), "0 6 Down");
}

#[test]
fn test_undeclared_assignment_strict_and_sloppy() {
    assert_eq!(thrown("leaked = 1;"), "leaked is not defined");
    assert_eq!(sloppy_output("leaked = 1; console.log(leaked);"), "1");
}

#[test]
fn test_top_level_this_is_empty_object() {
    assert_eq!(output("console.log(JSON.stringify(this));"), "{}");
}
