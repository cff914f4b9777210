//! Arithmetic, comparison, logical and assignment operators

use super::helpers::{output, run_with};
use crate::compiler::{CompilerOptions, ScriptTarget};

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(output("console.log(2 + 3 * 4 - 10 / 5);"), "12");
    assert_eq!(output("console.log(7 % 3, -7 % 3);"), "1 -1");
}

#[test]
fn test_string_concatenation_coercion() {
    assert_eq!(output("console.log('a' + 1 + 2, 1 + 2 + 'a');"), "a12 3a");
    assert_eq!(output("console.log('3' * '4', '10' - 1);"), "12 9");
}

#[test]
fn test_floating_point_output() {
    assert_eq!(output("console.log(0.1 + 0.2);"), "0.30000000000000004");
    assert_eq!(output("console.log(1 / 0, -1 / 0, 0 / 0);"), "Infinity -Infinity NaN");
}

#[test]
fn test_equality() {
    let source = r#"
        console.log(1 == '1', 1 === '1', null == undefined, null === undefined);
        console.log(NaN === NaN, [1] == 1, 0 == false);
    "#;
    assert_eq!(output(source), "true false true false\nfalse true true");
}

#[test]
fn test_relational_strings_and_numbers() {
    assert_eq!(output("console.log('b' > 'a', '10' < '9', 10 < 9);"), "true true false");
}

#[test]
fn test_logical_short_circuit() {
    let source = r#"
        let calls = 0;
        const bump = () => { calls++; return true; };
        false && bump();
        true || bump();
        null ?? bump();
        console.log(calls, 0 || 'fallback', 0 ?? 'kept', '' && 'x');
    "#;
    assert_eq!(output(source), "1 fallback 0 ");
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(
        output("console.log(5 & 3, 5 | 3, 5 ^ 3, ~5, 1 << 4, -16 >> 2, -16 >>> 28);"),
        "1 7 6 -6 16 -4 15"
    );
}

#[test]
fn test_compound_and_logical_assignment() {
    let source = r#"
        let n = 10;
        n += 5; n -= 3; n *= 2; n /= 4; n %= 4;
        let s = 'a';
        s += 'b';
        let maybe: string | null = null;
        maybe ??= 'set';
        let flag = 0;
        flag ||= 7;
        console.log(n, s, maybe, flag);
    "#;
    assert_eq!(output(source), "2 ab set 7");
}

#[test]
fn test_update_operators() {
    let source = r#"
        let i = 1;
        const a = i++;
        const b = ++i;
        const obj = { count: 0 };
        obj.count++;
        console.log(a, b, i, obj.count);
    "#;
    assert_eq!(output(source), "1 3 3 1");
}

#[test]
fn test_conditional_and_optional_chaining() {
    let source = r#"
        const user: any = { profile: { name: 'Ada' } };
        console.log(user.profile?.name, user.missing?.name, user.missing?.deep.chain);
        console.log(user.greet?.(), user ? 'yes' : 'no');
    "#;
    assert_eq!(output(source), "Ada undefined undefined\nundefined yes");
}

#[test]
fn test_in_instanceof_delete() {
    let source = r#"
        const obj: any = { a: 1 };
        console.log('a' in obj, 'b' in obj, [] instanceof Array, obj instanceof Array);
        delete obj.a;
        console.log('a' in obj);
    "#;
    assert_eq!(output(source), "true false true false\nfalse");
}

#[test]
fn test_exponent_same_result_on_every_target() {
    for target in [ScriptTarget::Es2015, ScriptTarget::EsNext] {
        let outcome = run_with(
            "let x = 3; x **= 2; console.log(2 ** 10, (-2) ** 3, x);",
            CompilerOptions {
                target,
                strict: true,
            },
        );
        assert_eq!(outcome.thrown, None);
        assert_eq!(outcome.output, "1024 -8 9");
    }
}

#[test]
fn test_comma_and_void() {
    assert_eq!(output("let a = (1, 2, 3); console.log(a, void 0);"), "3 undefined");
}
