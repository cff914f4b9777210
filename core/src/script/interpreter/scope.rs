//! Lexical environments
//!
//! Scopes are reference counted so closures keep exactly the environments
//! they capture alive. Objects never point back at scopes except through
//! function objects, so no reference cycles form.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::values::{ObjId, Val};

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Val,
    pub mutable: bool,
    /// `false` while a `let`/`const`/`class` binding is in its temporal dead zone
    pub initialized: bool,
}

impl Binding {
    pub fn var(value: Val) -> Self {
        Self {
            value,
            mutable: true,
            initialized: true,
        }
    }

    pub fn uninitialized(mutable: bool) -> Self {
        Self {
            value: Val::Undefined,
            mutable,
            initialized: false,
        }
    }
}

/// Per-call state of a non-arrow function
#[derive(Debug, Clone, Default)]
pub struct FuncFrame {
    /// `None` inside a derived constructor until `super()` returns
    pub this: Option<Val>,
    /// The function object being executed
    pub func: Option<ObjId>,
    pub home: Option<ObjId>,
    /// Constructor `new` was applied to, when constructing
    pub new_target: Option<ObjId>,
    pub args: Vec<Val>,
}

#[derive(Debug, Default)]
pub struct Scope {
    pub vars: HashMap<String, Binding>,
    pub parent: Option<ScopeRef>,
    /// Present on the scope that starts a function body (and on the program scope)
    pub frame: Option<FuncFrame>,
}

impl Scope {
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
            frame: None,
        }))
    }

    pub fn function(parent: &ScopeRef, frame: FuncFrame) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
            frame: Some(frame),
        }))
    }

    pub fn root(frame: FuncFrame) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
            frame: Some(frame),
        }))
    }

    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        self.vars.insert(name.into(), binding);
    }
}

/// Nearest scope (starting at `scope`) that binds `name`
pub fn resolve(scope: &ScopeRef, name: &str) -> Option<ScopeRef> {
    let mut current = Some(scope.clone());
    while let Some(candidate) = current {
        if candidate.borrow().vars.contains_key(name) {
            return Some(candidate);
        }
        current = candidate.borrow().parent.clone();
    }
    None
}

/// Nearest scope carrying a function frame
pub fn frame_scope(scope: &ScopeRef) -> Option<ScopeRef> {
    let mut current = Some(scope.clone());
    while let Some(candidate) = current {
        if candidate.borrow().frame.is_some() {
            return Some(candidate);
        }
        current = candidate.borrow().parent.clone();
    }
    None
}

/// Read the nearest function frame
pub fn with_frame<T>(scope: &ScopeRef, read: impl FnOnce(&FuncFrame) -> T) -> Option<T> {
    let owner = frame_scope(scope)?;
    let owner = owner.borrow();
    let result = owner.frame.as_ref().map(read);
    result
}

/// Copy of a scope's own bindings under the same parent (per-iteration `let`)
pub fn fork(scope: &ScopeRef) -> ScopeRef {
    let source = scope.borrow();
    Rc::new(RefCell::new(Scope {
        vars: source.vars.clone(),
        parent: source.parent.clone(),
        frame: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_walks_parents() {
        let root = Scope::root(FuncFrame::default());
        root.borrow_mut().declare("a", Binding::var(Val::Num(1.0)));
        let child = Scope::child(&root);
        child.borrow_mut().declare("b", Binding::var(Val::Num(2.0)));

        assert!(Rc::ptr_eq(&resolve(&child, "a").unwrap(), &root));
        assert!(Rc::ptr_eq(&resolve(&child, "b").unwrap(), &child));
        assert!(resolve(&child, "c").is_none());
        assert!(Rc::ptr_eq(&frame_scope(&child).unwrap(), &root));
    }

    #[test]
    fn test_fork_copies_bindings() {
        let root = Scope::root(FuncFrame::default());
        let loop_scope = Scope::child(&root);
        loop_scope.borrow_mut().declare("i", Binding::var(Val::Num(0.0)));

        let next = fork(&loop_scope);
        if let Some(binding) = next.borrow_mut().vars.get_mut("i") {
            binding.value = Val::Num(1.0);
        }

        assert!(matches!(loop_scope.borrow().vars["i"].value, Val::Num(n) if n == 0.0));
        assert!(matches!(next.borrow().vars["i"].value, Val::Num(n) if n == 1.0));
    }
}
