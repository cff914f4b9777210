//! Classes, inheritance and `super`

use super::helpers::{output, thrown};

#[test]
fn test_class_fields_and_methods() {
    let source = r#"
        class Counter {
            count = 0;
            private step: number;
            constructor(step: number) {
                this.step = step;
            }
            increment(): Counter {
                this.count += this.step;
                return this;
            }
        }
        const c = new Counter(2);
        c.increment().increment();
        console.log(c.count);
    "#;
    assert_eq!(output(source), "4");
}

#[test]
fn test_parameter_properties() {
    let source = r#"
        class Point {
            constructor(public x: number, private readonly y: number) {}
            sum() { return this.x + this.y; }
        }
        console.log(new Point(3, 4).sum());
    "#;
    assert_eq!(output(source), "7");
}

#[test]
fn test_inheritance_and_super() {
    let source = r#"
        class Animal {
            constructor(protected name: string) {}
            speak() { return `${this.name} makes a sound`; }
        }
        class Dog extends Animal {
            tricks: string[] = [];
            constructor(name: string) {
                super(name);
                this.tricks.push('sit');
            }
            speak() { return super.speak() + ' (woof)'; }
        }
        const d = new Dog('Rex');
        console.log(d.speak());
        console.log(d.tricks.length, d instanceof Dog, d instanceof Animal);
    "#;
    assert_eq!(output(source), "Rex makes a sound (woof)\n1 true true");
}

#[test]
fn test_default_derived_constructor() {
    let source = r#"
        class Base { constructor(public value: number) {} }
        class Derived extends Base {}
        console.log(new Derived(42).value);
    "#;
    assert_eq!(output(source), "42");
}

#[test]
fn test_getters_setters_and_statics() {
    let source = r#"
        class Temperature {
            static count = 0;
            private celsius = 0;
            constructor() { Temperature.count++; }
            get fahrenheit(): number { return this.celsius * 9 / 5 + 32; }
            set fahrenheit(value: number) { this.celsius = (value - 32) * 5 / 9; }
            static create() { return new Temperature(); }
        }
        const t = Temperature.create();
        t.fahrenheit = 212;
        console.log(t.fahrenheit, Temperature.count);
    "#;
    assert_eq!(output(source), "212 1");
}

#[test]
fn test_custom_error_subclass() {
    let source = r#"
        class ValidationError extends Error {
            constructor(message: string) {
                super(message);
                this.name = 'ValidationError';
            }
        }
        try {
            throw new ValidationError('bad input');
        } catch (e) {
            console.log(e instanceof ValidationError, e instanceof Error, String(e));
        }
    "#;
    assert_eq!(output(source), "true true ValidationError: bad input");
}

#[test]
fn test_uncaught_custom_error_message() {
    let source = r#"
        class NotFound extends Error {}
        throw new NotFound('missing key');
    "#;
    assert_eq!(thrown(source), "missing key");
}

#[test]
fn test_class_requires_new() {
    assert_eq!(
        thrown("class Foo {} (Foo as any)();"),
        "Class constructor Foo cannot be invoked without 'new'"
    );
}

#[test]
fn test_this_before_super() {
    let source = r#"
        class A {}
        class B extends A {
            constructor() {
                this.x = 1;
                super();
            }
        }
        new B();
    "#;
    assert_eq!(
        thrown(source),
        "Must call super constructor in derived class before accessing 'this' or returning from derived constructor"
    );
}

#[test]
fn test_generic_data_structure() {
    let source = r#"
        class Stack<T> {
            private items: T[] = [];
            push(item: T): void { this.items.push(item); }
            pop(): T | undefined { return this.items.pop(); }
            get size(): number { return this.items.length; }
        }
        const s = new Stack<number>();
        s.push(1); s.push(2); s.push(3);
        console.log(s.pop(), s.size);
    "#;
    assert_eq!(output(source), "3 2");
}
