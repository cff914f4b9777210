//! Runtime value types and the object heap

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::scope::ScopeRef;
use super::stdlib::Native;
use crate::script::ast::FunctionDef;

/// Index of an object in the [`Heap`]
pub type ObjId = usize;

/* ===================== Values ===================== */

/// Runtime value
#[derive(Debug, Clone)]
pub enum Val {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Obj(ObjId),
}

impl Val {
    pub fn string(text: impl AsRef<str>) -> Self {
        Val::Str(Rc::from(text.as_ref()))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    /// ToBoolean
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => !(*n == 0.0 || n.is_nan()),
            Val::Str(s) => !s.is_empty(),
            Val::Obj(_) => true,
        }
    }

    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Val::Obj(id) => Some(*id),
            _ => None,
        }
    }
}

/// `===`
pub fn strict_equals(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Undefined, Val::Undefined) | (Val::Null, Val::Null) => true,
        (Val::Bool(x), Val::Bool(y)) => x == y,
        (Val::Num(x), Val::Num(y)) => x == y,
        (Val::Str(x), Val::Str(y)) => x == y,
        (Val::Obj(x), Val::Obj(y)) => x == y,
        _ => false,
    }
}

/// SameValueZero: like `===` but NaN equals NaN
pub fn same_value_zero(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Num(x), Val::Num(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

/* ===================== Functions ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Normal,
    Arrow,
    Method,
    ClassConstructor { derived: bool },
}

/// Callable payload of a function object
#[derive(Clone)]
pub enum Func {
    Script {
        def: Arc<FunctionDef>,
        env: ScopeRef,
        kind: FuncKind,
        /// Object whose prototype `super.x` resolves against
        home: Option<ObjId>,
    },
    Native(Native),
    Bound {
        target: ObjId,
        this: Val,
        args: Vec<Val>,
    },
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Func::Script { def, kind, .. } => write!(
                f,
                "Script({}, {:?})",
                def.name.as_deref().unwrap_or("<anonymous>"),
                kind
            ),
            Func::Native(native) => write!(f, "Native({:?})", native),
            Func::Bound { target, .. } => write!(f, "Bound(#{})", target),
        }
    }
}

/* ===================== Objects ===================== */

#[derive(Debug, Clone)]
pub enum Prop {
    Data { value: Val, enumerable: bool },
    Accessor { get: Option<Val>, set: Option<Val> },
}

impl Prop {
    pub fn data(value: Val) -> Self {
        Prop::Data {
            value,
            enumerable: true,
        }
    }

    pub fn hidden(value: Val) -> Self {
        Prop::Data {
            value,
            enumerable: false,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        matches!(self, Prop::Data { enumerable: true, .. })
    }
}

/// Map/Set key under SameValueZero
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Undefined,
    Null,
    Bool(bool),
    Num(u64),
    Str(Rc<str>),
    Obj(ObjId),
}

impl MapKey {
    pub fn from_val(value: &Val) -> Self {
        match value {
            Val::Undefined => MapKey::Undefined,
            Val::Null => MapKey::Null,
            Val::Bool(b) => MapKey::Bool(*b),
            // -0 and +0 are one key, every NaN is one key
            Val::Num(n) if *n == 0.0 => MapKey::Num(0f64.to_bits()),
            Val::Num(n) if n.is_nan() => MapKey::Num(f64::NAN.to_bits()),
            Val::Num(n) => MapKey::Num(n.to_bits()),
            Val::Str(s) => MapKey::Str(s.clone()),
            Val::Obj(id) => MapKey::Obj(*id),
        }
    }

    pub fn to_val(&self) -> Val {
        match self {
            MapKey::Undefined => Val::Undefined,
            MapKey::Null => Val::Null,
            MapKey::Bool(b) => Val::Bool(*b),
            MapKey::Num(bits) => Val::Num(f64::from_bits(*bits)),
            MapKey::Str(s) => Val::Str(s.clone()),
            MapKey::Obj(id) => Val::Obj(*id),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ObjKind {
    Plain,
    Array(Vec<Val>),
    Function(Func),
    Map(IndexMap<MapKey, Val>),
    Set(IndexSet<MapKey>),
}

#[derive(Debug, Clone)]
pub struct HeapObj {
    pub kind: ObjKind,
    pub props: IndexMap<String, Prop>,
    pub proto: Option<ObjId>,
    pub frozen: bool,
}

impl HeapObj {
    pub fn new(kind: ObjKind, proto: Option<ObjId>) -> Self {
        Self {
            kind,
            props: IndexMap::new(),
            proto,
            frozen: false,
        }
    }

    pub fn plain(proto: Option<ObjId>) -> Self {
        Self::new(ObjKind::Plain, proto)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjKind::Function(_))
    }
}

/// Arena of every object created during one evaluation
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObj>,
}

impl Heap {
    pub fn alloc(&mut self, obj: HeapObj) -> ObjId {
        self.objects.push(obj);
        self.objects.len() - 1
    }

    pub fn get(&self, id: ObjId) -> &HeapObj {
        &self.objects[id]
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut HeapObj {
        &mut self.objects[id]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Define or overwrite an own property
    pub fn define(&mut self, id: ObjId, key: impl Into<String>, prop: Prop) {
        self.objects[id].props.insert(key.into(), prop);
    }
}

/// Canonical array index (`"0"`, `"17"`; not `"01"` or `"-1"`)
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || key.len() > 10 {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u64 = key.parse().ok()?;
    if index < u32::MAX as u64 {
        Some(index as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Val::Num(f64::NAN).is_truthy());
        assert!(!Val::string("").is_truthy());
        assert!(Val::string("0").is_truthy());
        assert!(Val::Obj(0).is_truthy());
        assert!(!Val::Null.is_truthy());
    }

    #[test]
    fn test_same_value_zero_keys() {
        assert_eq!(MapKey::from_val(&Val::Num(-0.0)), MapKey::from_val(&Val::Num(0.0)));
        assert_eq!(
            MapKey::from_val(&Val::Num(f64::NAN)),
            MapKey::from_val(&Val::Num(f64::NAN))
        );
        assert_ne!(MapKey::from_val(&Val::Num(1.0)), MapKey::from_val(&Val::string("1")));
        assert!(same_value_zero(&Val::Num(f64::NAN), &Val::Num(f64::NAN)));
        assert!(!strict_equals(&Val::Num(f64::NAN), &Val::Num(f64::NAN)));
    }

    #[test]
    fn test_array_index() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("length"), None);
        assert_eq!(array_index("4294967295"), None);
    }
}
