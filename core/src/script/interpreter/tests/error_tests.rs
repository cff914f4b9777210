//! Exceptions and built-in error types

use super::helpers::{output, run, thrown};

#[test]
fn test_try_catch_finally_order() {
    let source = r#"
        const log: string[] = [];
        try {
            log.push('try');
            throw new Error('x');
        } catch (e) {
            log.push('catch ' + (e as Error).message);
        } finally {
            log.push('finally');
        }
        console.log(log.join(', '));
    "#;
    assert_eq!(output(source), "try, catch x, finally");
}

#[test]
fn test_finally_runs_on_return() {
    let source = r#"
        function f() {
            try {
                return 'from try';
            } finally {
                console.log('cleanup');
            }
        }
        console.log(f());
    "#;
    assert_eq!(output(source), "cleanup\nfrom try");
}

#[test]
fn test_catch_without_binding_and_rethrow() {
    let source = r#"
        try {
            try {
                throw new RangeError('inner');
            } catch {
                throw new TypeError('outer');
            }
        } catch (e) {
            console.log(e instanceof TypeError, (e as Error).message);
        }
    "#;
    assert_eq!(output(source), "true outer");
}

#[test]
fn test_runtime_type_errors() {
    assert_eq!(
        thrown("const a: any = undefined; a.b;"),
        "Cannot read properties of undefined (reading 'b')"
    );
    assert_eq!(
        thrown("const a: any = null; a.b = 1;"),
        "Cannot set properties of null (setting 'b')"
    );
    assert_eq!(thrown("missingFunction();"), "missingFunction is not defined");
    assert_eq!(thrown("const n: any = 5; new n();"), "n is not a constructor");
}

#[test]
fn test_error_name_and_to_string() {
    let source = r#"
        const e = new TypeError('wrong type');
        console.log(e.name, e.message, e.toString());
        console.log(String(new Error()));
    "#;
    assert_eq!(output(source), "TypeError wrong type TypeError: wrong type\nError");
}

#[test]
fn test_thrown_primitive_has_no_message() {
    let outcome = run("console.log('first'); throw 'plain string';");
    assert_eq!(outcome.output, "first");
    assert_eq!(outcome.thrown.as_deref(), Some("<no message>"));
}

#[test]
fn test_output_before_throw_is_kept() {
    let outcome = run("console.log(1); console.log(2); null.x;");
    assert_eq!(outcome.output, "1\n2");
    assert_eq!(
        outcome.thrown.as_deref(),
        Some("Cannot read properties of null (reading 'x')")
    );
}

#[test]
fn test_frozen_object_writes_throw() {
    assert_eq!(
        thrown("const o = Object.freeze({ a: 1 }); (o as any).a = 2;"),
        "Cannot assign to read only property 'a' of object"
    );
}

#[test]
fn test_json_cycle_error() {
    assert_eq!(
        thrown("const a: any = {}; a.self = a; JSON.stringify(a);"),
        "Converting circular structure to JSON"
    );
}
