//! Abstract Syntax Tree node types
//!
//! This is the executable form the compiler emits: types are already erased
//! and TypeScript-only constructs (enums, parameter properties, template
//! literals) are lowered into the plain statements and expressions below.

use std::sync::Arc;

/* ===================== Program ===================== */

/// A lowered program, ready for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    /// Strict semantics: assignment to an undeclared name throws
    pub strict: bool,
}

/* ===================== Statements ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

/// Statement AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Decl {
        kind: DeclKind,
        decls: Vec<Declarator>,
    },
    Function(Arc<FunctionDef>),
    Class(Arc<ClassDef>),
    Block(Vec<Stmt>),
    If {
        test: Expr,
        then_s: Box<Stmt>,
        else_s: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: DeclKind,
        target: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
    },
    ForIn {
        kind: DeclKind,
        target: Pattern,
        object: Expr,
        body: Box<Stmt>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for the `default` label
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

/* ===================== Patterns ===================== */

/// Binding or assignment target
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    /// Member or index expression (assignment targets only)
    Target(Box<Expr>),
    Array {
        elements: Vec<PatternElem>,
        rest: Option<Box<Pattern>>,
    },
    Object {
        props: Vec<PatternProp>,
        rest: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternElem {
    pub target: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternProp {
    pub key: PropKey,
    pub target: Pattern,
    pub default: Option<Expr>,
}

/* ===================== Functions & Classes ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub target: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Arrow functions capture `this` lexically and cannot be constructed
    pub is_arrow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub key: PropKey,
    pub kind: MethodKind,
    pub is_static: bool,
    pub func: Arc<FunctionDef>,
}

/// Static field; instance fields are lowered into the constructor
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub key: PropKey,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<Expr>,
    /// Always present: a default constructor is synthesized when the class declares none
    pub constructor: Arc<FunctionDef>,
    pub statics: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Named(String),
    Computed(Box<Expr>),
}

/// Call argument or array element
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Plain(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProp {
    KeyValue(PropKey, Expr),
    Spread(Expr),
    /// `{ a = 1 }`: only meaningful once converted into a pattern
    CoverInit { name: String, default: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    InstanceOf,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
    Logical(LogicalOp),
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Super,
    Array(Vec<Arg>),
    Object(Vec<ObjectProp>),
    Function(Arc<FunctionDef>),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Pattern>,
        value: Box<Expr>,
    },
    Cond {
        test: Box<Expr>,
        cons: Box<Expr>,
        alt: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    /// Boundary of an optional chain: a short-circuited link yields `undefined` here
    OptionalChain(Box<Expr>),
    Seq(Vec<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
            optional: false,
        }
    }

    pub fn index(object: Expr, index: Expr) -> Self {
        Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
            optional: false,
        }
    }

    pub fn assign(target: Pattern, value: Expr) -> Self {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args: args.into_iter().map(Arg::Plain).collect(),
            optional: false,
        }
    }
}
