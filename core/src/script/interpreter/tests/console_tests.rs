//! Console formatting and line capture

use super::helpers::{output, run};

#[test]
fn test_strings_print_as_is() {
    assert_eq!(output("console.log('plain text');"), "plain text");
    assert_eq!(output("console.log('');"), "");
}

#[test]
fn test_multiple_arguments_join_with_space() {
    assert_eq!(output("console.log('sum:', 1 + 2, true, undefined);"), "sum: 3 true undefined");
}

#[test]
fn test_object_prints_as_indented_json() {
    assert_eq!(output("console.log({ a: 1 });"), "{\n  \"a\": 1\n}");
}

#[test]
fn test_nested_values() {
    let source = r#"
        console.log({ name: 'tree', children: [{ id: 1 }, []], empty: {} });
    "#;
    let expected = "{\n  \"name\": \"tree\",\n  \"children\": [\n    {\n      \"id\": 1\n    },\n    []\n  ],\n  \"empty\": {}\n}";
    assert_eq!(output(source), expected);
}

#[test]
fn test_array_prints_as_json() {
    assert_eq!(output("console.log([1, 'two', null]);"), "[\n  1,\n  \"two\",\n  null\n]");
}

#[test]
fn test_null_and_undefined() {
    assert_eq!(output("console.log(null, undefined);"), "null undefined");
}

#[test]
fn test_unserializable_members_are_dropped() {
    let source = "console.log({ keep: 1, skip: undefined, fn: () => 1, n: NaN });";
    assert_eq!(output(source), "{\n  \"keep\": 1,\n  \"n\": null\n}");
}

#[test]
fn test_functions_print_with_string_semantics() {
    assert_eq!(
        output("function add() {} console.log(add);"),
        "function add() { [native code] }"
    );
}

#[test]
fn test_map_and_class_instances() {
    let source = r#"
        class Point { constructor(public x: number, public y: number) {} }
        console.log(new Point(1, 2));
        console.log(new Map([['a', 1]]));
    "#;
    assert_eq!(output(source), "{\n  \"x\": 1,\n  \"y\": 2\n}\n{}");
}

#[test]
fn test_error_lines_are_prefixed() {
    assert_eq!(
        output("console.log('a'); console.error('bad', 42); console.log('b');"),
        "a\nError: bad 42\nb"
    );
}

#[test]
fn test_lines_before_throw_are_kept() {
    let outcome = run("console.log('before'); throw new Error('boom');");
    assert_eq!(outcome.output, "before");
    assert_eq!(outcome.thrown.as_deref(), Some("boom"));
}

#[test]
fn test_numbers_format_like_string() {
    assert_eq!(
        output("console.log(0.1 + 0.2, 1e21, -0, 100 / 3, 2 ** 53);"),
        "0.30000000000000004 1e+21 0 33.333333333333336 9007199254740992"
    );
}

#[test]
fn test_large_integers_print_shortest_digits() {
    assert_eq!(
        output("console.log(2 ** 64, String(2 ** 60));"),
        "18446744073709552000 1152921504606847000"
    );
}

#[test]
fn test_circular_structure_throws() {
    let outcome = run("const a: any = {}; a.self = a; console.log(a);");
    assert_eq!(outcome.output, "");
    assert_eq!(
        outcome.thrown.as_deref(),
        Some("Converting circular structure to JSON")
    );
}
