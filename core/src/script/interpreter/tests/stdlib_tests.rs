//! Built-in objects and methods

use super::helpers::{output, thrown};

/* ===================== Array ===================== */

#[test]
fn test_array_mutators() {
    let source = r#"
        const a = [1, 2, 3];
        a.push(4, 5);
        const last = a.pop();
        const first = a.shift();
        a.unshift(0);
        console.log(a.join(','), last, first, a.length);
    "#;
    assert_eq!(output(source), "0,2,3,4 5 1 4");
}

#[test]
fn test_array_slice_and_splice() {
    let source = r#"
        const a = [1, 2, 3, 4, 5];
        console.log(a.slice(1, 3).join(','), a.slice(-2).join(','));
        const removed = a.splice(1, 2, 'x', 'y', 'z');
        console.log(removed.join(','), a.join(','));
    "#;
    assert_eq!(output(source), "2,3 4,5\n2,3 1,x,y,z,4,5");
}

#[test]
fn test_array_searching() {
    let source = r#"
        const a = [5, 12, 8, 130, 44, NaN];
        console.log(a.indexOf(8), a.indexOf(99), a.includes(NaN), a.indexOf(NaN));
        console.log(a.find(n => n > 10), a.findIndex(n => n > 100), a.findLast(n => n < 10));
        console.log(a.some(n => n > 100), a.every(n => n > 1));
    "#;
    assert_eq!(output(source), "2 -1 true -1\n12 3 8\ntrue false");
}

#[test]
fn test_array_transforms() {
    let source = r#"
        const a = [1, 2, 3, 4];
        console.log(a.map(n => n * n).join(' '));
        console.log(a.filter(n => n % 2 === 0).join(' '));
        console.log(a.reduce((sum, n) => sum + n, 0), a.reduce((x, y) => x * y));
        console.log([[1, 2], [3, [4]]].flat().length, [1, 2].flatMap(n => [n, n]).join(''));
        console.log(a.concat([5, 6], 7).length, [...a].reverse().join(''));
    "#;
    assert_eq!(output(source), "1 4 9 16\n2 4\n10 24\n4 1122\n7 4321");
}

#[test]
fn test_array_sort() {
    let source = r#"
        console.log([10, 9, 1, 100].sort().join(','));
        console.log([10, 9, 1, 100].sort((a, b) => a - b).join(','));
        const people = [{ n: 'b', age: 30 }, { n: 'a', age: 25 }, { n: 'c', age: 30 }];
        console.log(people.sort((x, y) => x.age - y.age).map(p => p.n).join(''));
    "#;
    assert_eq!(output(source), "1,10,100,9\n1,9,10,100\nabc");
}

#[test]
fn test_array_constructors() {
    let source = r#"
        console.log(new Array(3).fill(0).join(','), Array.of(7, 8).join(','));
        console.log(Array.from('hey').join('-'), Array.from({ length: 3 }, (_, i) => i * 2).join(','));
        console.log(Array.isArray([]), Array.isArray({}), [1, 2, 3].at(-1));
    "#;
    assert_eq!(output(source), "0,0,0 7,8\nh-e-y 0,2,4\ntrue false 3");
}

#[test]
fn test_reduce_empty_without_initial() {
    assert_eq!(
        thrown("[].reduce((a: number, b: number) => a + b);"),
        "Reduce of empty array with no initial value"
    );
}

#[test]
fn test_array_length_assignment() {
    assert_eq!(output("const a = [1, 2, 3]; a.length = 1; console.log(a.length, a[0]);"), "1 1");
}

/* ===================== String ===================== */

#[test]
fn test_string_methods() {
    let source = r#"
        const s = '  Hello, World  ';
        const t = s.trim();
        console.log(t.toUpperCase(), t.toLowerCase(), t.length);
        console.log(t.charAt(0), t.charCodeAt(1), t.indexOf('o'), t.lastIndexOf('o'));
        console.log(t.substring(7), t.slice(-5, -1), t.split(', ').join('|'));
        console.log(t.startsWith('Hell'), t.endsWith('!'), t.includes('lo, W'));
    "#;
    assert_eq!(
        output(source),
        "HELLO, WORLD hello, world 12\nH 101 4 8\nWorld Worl Hello|World\ntrue false true"
    );
}

#[test]
fn test_string_padding_and_repeat() {
    let source = r#"
        console.log('5'.padStart(3, '0'), 'ab'.padEnd(5, '-'), 'ha'.repeat(3));
        console.log('a-b-c'.replace('-', '+'), 'a-b-c'.replaceAll('-', '+'));
        console.log(String.fromCharCode(72, 105), 'abc'.split('').join(','), 'x'.concat('y', 1));
    "#;
    assert_eq!(output(source), "005 ab--- hahaha\na+b-c a+b+c\nHi a,b,c xy1");
}

#[test]
fn test_string_indexing_is_utf16() {
    assert_eq!(output("const s = 'a😀b'; console.log(s.length, s[3], s.charAt(0));"), "4 b a");
}

#[test]
fn test_repeat_negative_count() {
    assert_eq!(thrown("'x'.repeat(-1);"), "Invalid count value: -1");
}

/* ===================== Number & Math ===================== */

#[test]
fn test_number_formatting() {
    let source = r#"
        console.log((3.14159).toFixed(2), (2.5).toFixed(0), (255).toString(16), (5).toString(2));
        console.log(Number('42'), Number(''), Number('abc'), parseInt('08'), parseFloat('1.5e2'));
        console.log(Number.isInteger(5), Number.isInteger(5.5), Number.MAX_SAFE_INTEGER);
    "#;
    assert_eq!(
        output(source),
        "3.14 3 ff 101\n42 0 NaN 8 150\ntrue false 9007199254740991"
    );
}

#[test]
fn test_math_functions() {
    let source = r#"
        console.log(Math.floor(3.7), Math.ceil(3.2), Math.round(2.5), Math.round(-2.5));
        console.log(Math.max(1, 5, 3), Math.min(), Math.abs(-4), Math.pow(2, 8), Math.sqrt(81));
        console.log(Math.trunc(-4.7), Math.sign(-3), Math.hypot(3, 4), Math.PI.toFixed(4));
        const r = Math.random();
        console.log(r >= 0 && r < 1);
    "#;
    assert_eq!(
        output(source),
        "3 4 3 -2\n5 Infinity 4 256 9\n-4 -1 5 3.1416\ntrue"
    );
}

#[test]
fn test_to_fixed_range() {
    assert_eq!(
        thrown("(1).toFixed(101);"),
        "toFixed() digits argument must be between 0 and 100"
    );
}

/* ===================== Object & JSON ===================== */

#[test]
fn test_object_statics() {
    let source = r#"
        const o = { b: 2, a: 1, 1: 'one' };
        console.log(Object.keys(o).join(','), Object.values(o).join(','));
        console.log(Object.entries({ x: 1 }).map(([k, v]) => k + '=' + v).join(''));
        const merged = Object.assign({}, { a: 1 }, { b: 2 }, { a: 3 });
        console.log(JSON.stringify(merged));
        console.log(JSON.stringify(Object.fromEntries([['k', 'v']])));
        const frozen = Object.freeze({ z: 1 });
        console.log(Object.isFrozen(frozen), Object.isFrozen({}));
    "#;
    assert_eq!(
        output(source),
        "1,b,a one,2,1\nx=1\n{\"a\":3,\"b\":2}\n{\"k\":\"v\"}\ntrue false"
    );
}

#[test]
fn test_object_spread_and_prototype() {
    let source = r#"
        const base = { greet() { return 'hi'; } };
        const child = Object.create(base);
        const copy = { ...{ a: 1 }, b: 2 };
        console.log(child.greet(), Object.getPrototypeOf(child) === base, JSON.stringify(copy));
        console.log({}.hasOwnProperty('x'), copy.hasOwnProperty('a'), Object.prototype.toString.call([]));
    "#;
    assert_eq!(
        output(source),
        "hi true {\"a\":1,\"b\":2}\nfalse true [object Array]"
    );
}

#[test]
fn test_json_round_trip() {
    let source = r#"
        const parsed = JSON.parse('{"name":"x","list":[1,2,{"deep":true}],"n":null}');
        console.log(parsed.name, parsed.list[2].deep, parsed.n);
        console.log(JSON.stringify(parsed));
        console.log(JSON.stringify({ u: undefined, f() {}, arr: [undefined, NaN] }));
        console.log(JSON.stringify('text'), JSON.stringify(undefined));
        console.log(JSON.stringify({ a: [1] }, null, 2));
    "#;
    assert_eq!(
        output(source),
        "x true null\n{\"name\":\"x\",\"list\":[1,2,{\"deep\":true}],\"n\":null}\n{\"arr\":[null,null]}\n\"text\" undefined\n{\n  \"a\": [\n    1\n  ]\n}"
    );
}

#[test]
fn test_json_parse_error() {
    assert!(thrown("JSON.parse('{bad');").starts_with("Unexpected token in JSON"));
}

#[test]
fn test_json_to_json_hook() {
    let source = r#"
        const money = { cents: 150, toJSON() { return (this.cents / 100).toFixed(2); } };
        console.log(JSON.stringify({ price: money }));
    "#;
    assert_eq!(output(source), "{\"price\":\"1.50\"}");
}

/* ===================== Map & Set ===================== */

#[test]
fn test_map_operations() {
    let source = r#"
        const m = new Map<string, number>();
        m.set('a', 1).set('b', 2).set('a', 3);
        console.log(m.get('a'), m.has('b'), m.has('z'), m.size);
        m.delete('b');
        const seen: string[] = [];
        m.forEach((value, key) => seen.push(key + value));
        console.log(seen.join(','), m.keys().length, [...m.entries()][0].join(':'));
    "#;
    assert_eq!(output(source), "3 true false 2\na3 1 a:3");
}

#[test]
fn test_map_keys_use_same_value_zero() {
    let source = r#"
        const m = new Map<any, string>([[NaN, 'nan'], [0, 'zero']]);
        const key = {};
        m.set(key, 'obj');
        console.log(m.get(NaN), m.get(-0), m.get({}), m.get(key), m.get('0'));
    "#;
    assert_eq!(output(source), "nan zero undefined obj undefined");
}

#[test]
fn test_set_operations() {
    let source = r#"
        const s = new Set([3, 1, 3, 2, 1]);
        s.add(4);
        console.log(s.size, s.has(2), [...s].join(','));
        s.delete(3);
        console.log(Array.from(s).join(','), [...new Set('hello')].join(''));
    "#;
    assert_eq!(output(source), "4 true 3,1,2,4\n1,2,4 helo");
}

#[test]
fn test_map_requires_new() {
    assert_eq!(thrown("(Map as any)();"), "Constructor Map requires 'new'");
}
