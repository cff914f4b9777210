//! Loops, branches and switch

use super::helpers::output;

#[test]
fn test_if_else_chain() {
    let source = r#"
        function grade(score: number) {
            if (score >= 90) return 'A';
            else if (score >= 80) return 'B';
            else return 'C';
        }
        console.log(grade(95), grade(85), grade(10));
    "#;
    assert_eq!(output(source), "A B C");
}

#[test]
fn test_while_and_do_while() {
    let source = r#"
        let n = 0;
        while (n < 5) n += 2;
        let m = 10;
        do { m++; } while (m < 5);
        console.log(n, m);
    "#;
    assert_eq!(output(source), "6 11");
}

#[test]
fn test_for_with_break_and_continue() {
    let source = r#"
        const seen: number[] = [];
        for (let i = 0; i < 10; i++) {
            if (i % 2 === 0) continue;
            if (i > 7) break;
            seen.push(i);
        }
        console.log(seen.join(' '));
    "#;
    assert_eq!(output(source), "1 3 5 7");
}

#[test]
fn test_for_of_over_collections() {
    let source = r#"
        let total = 0;
        for (const n of [1, 2, 3]) total += n;
        const letters: string[] = [];
        for (const ch of 'abc') letters.push(ch.toUpperCase());
        const pairs: string[] = [];
        for (const [key, value] of new Map([['a', 1], ['b', 2]])) pairs.push(key + value);
        console.log(total, letters.join(''), pairs.join(','));
    "#;
    assert_eq!(output(source), "6 ABC a1,b2");
}

#[test]
fn test_for_in_keys() {
    let source = r#"
        const obj = { x: 1, y: 2 };
        const keys: string[] = [];
        for (const key in obj) keys.push(key);
        for (const index in ['p', 'q']) keys.push(index);
        console.log(keys.join(','));
    "#;
    assert_eq!(output(source), "x,y,0,1");
}

#[test]
fn test_switch_fallthrough_and_default() {
    let source = r#"
        function kind(n: number) {
            let out = '';
            switch (n) {
                case 1:
                case 2:
                    out = 'small';
                    break;
                case 3:
                    out = 'three';
                default:
                    out += '!';
            }
            return out;
        }
        console.log(kind(1), kind(3), kind(9));
    "#;
    assert_eq!(output(source), "small three! !");
}

#[test]
fn test_nested_loops_with_labels_free_break() {
    let source = r#"
        const grid: number[][] = [];
        for (let r = 0; r < 3; r++) {
            const row: number[] = [];
            for (let c = 0; c < 3; c++) {
                if (c > r) break;
                row.push(r * c);
            }
            grid.push(row);
        }
        console.log(grid.map(row => row.join(',')).join(' | '));
    "#;
    assert_eq!(output(source), "0 | 0,1 | 0,2,4");
}

#[test]
fn test_top_level_return_ends_program() {
    assert_eq!(output("console.log('a'); return; console.log('b');"), "a");
}
