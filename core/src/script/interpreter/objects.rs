//! Object model: allocation, property access and type conversions

use std::cmp::Ordering;
use std::rc::Rc;

use super::control::EvalResult;
use super::realm::ErrorKind;
use super::values::{
    array_index, strict_equals, Func, FuncKind, HeapObj, ObjId, ObjKind, Prop, Val,
};
use super::Interpreter;
use crate::script::number::{number_to_string, string_to_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    String,
}

impl<'c> Interpreter<'c> {
    /* ===================== Allocation ===================== */

    pub(crate) fn alloc_plain(&mut self, proto: Option<ObjId>) -> ObjId {
        self.heap.alloc(HeapObj::plain(proto))
    }

    pub(crate) fn alloc_object(&mut self) -> ObjId {
        self.alloc_plain(Some(self.realm.object_proto))
    }

    pub(crate) fn alloc_array(&mut self, items: Vec<Val>) -> Val {
        let proto = self.realm.array_proto;
        Val::Obj(self.heap.alloc(HeapObj::new(ObjKind::Array(items), Some(proto))))
    }

    /// `[key, value]` pair arrays, as produced by `entries()`
    pub(crate) fn alloc_pairs(&mut self, pairs: Vec<(Val, Val)>) -> Val {
        let items = pairs
            .into_iter()
            .map(|(key, value)| self.alloc_array(vec![key, value]))
            .collect();
        self.alloc_array(items)
    }

    /// `prototype` of a constructor, or `fallback` when it is not an object
    pub(crate) fn prototype_for(&mut self, ctor: ObjId, fallback: ObjId) -> EvalResult<ObjId> {
        match self.get_from(ctor, "prototype", &Val::Obj(ctor))? {
            Val::Obj(proto) => Ok(proto),
            _ => Ok(fallback),
        }
    }

    /* ===================== Inspection ===================== */

    pub(crate) fn is_callable(&self, value: &Val) -> bool {
        match value {
            Val::Obj(id) => self.heap.get(*id).is_callable(),
            _ => false,
        }
    }

    pub(crate) fn is_constructor(&self, value: &Val) -> bool {
        let Val::Obj(id) = value else {
            return false;
        };
        match &self.heap.get(*id).kind {
            ObjKind::Function(Func::Script { kind, .. }) => {
                matches!(kind, FuncKind::Normal | FuncKind::ClassConstructor { .. })
            }
            ObjKind::Function(Func::Native(native)) => native.is_constructor(),
            ObjKind::Function(Func::Bound { target, .. }) => {
                self.is_constructor(&Val::Obj(*target))
            }
            _ => false,
        }
    }

    pub(crate) fn is_array(&self, value: &Val) -> bool {
        matches!(value, Val::Obj(id) if matches!(self.heap.get(*id).kind, ObjKind::Array(_)))
    }

    /// Snapshot of an array's elements
    pub(crate) fn array_items(&self, value: &Val) -> Option<Vec<Val>> {
        match value {
            Val::Obj(id) => match &self.heap.get(*id).kind {
                ObjKind::Array(items) => Some(items.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn array_len(&self, id: ObjId) -> usize {
        match &self.heap.get(id).kind {
            ObjKind::Array(items) => items.len(),
            _ => 0,
        }
    }

    pub(crate) fn array_get(&self, id: ObjId, index: usize) -> Val {
        match &self.heap.get(id).kind {
            ObjKind::Array(items) => items.get(index).cloned().unwrap_or(Val::Undefined),
            _ => Val::Undefined,
        }
    }

    pub(crate) fn type_of(&self, value: &Val) -> &'static str {
        match value {
            Val::Undefined => "undefined",
            Val::Null => "object",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Obj(_) if self.is_callable(value) => "function",
            Val::Obj(_) => "object",
        }
    }

    /// Short rendering used inside error messages
    pub(crate) fn describe_value(&self, value: &Val) -> String {
        match value {
            Val::Str(s) => format!("\"{}\"", s),
            Val::Num(n) => number_to_string(*n),
            Val::Bool(b) => b.to_string(),
            Val::Undefined => "undefined".to_string(),
            Val::Null => "null".to_string(),
            Val::Obj(_) if self.is_callable(value) => {
                format!("function {}", self.function_name(value))
            }
            Val::Obj(_) if self.is_array(value) => "[object Array]".to_string(),
            Val::Obj(_) => "#<Object>".to_string(),
        }
    }

    pub(crate) fn function_name(&self, value: &Val) -> String {
        if let Val::Obj(id) = value {
            if let Some(Prop::Data {
                value: Val::Str(name),
                ..
            }) = self.heap.get(*id).props.get("name")
            {
                return name.to_string();
            }
        }
        String::new()
    }

    /* ===================== Property Read ===================== */

    /// `target[key]` for any value
    pub(crate) fn get(&mut self, target: &Val, key: &str) -> EvalResult {
        match target {
            Val::Undefined | Val::Null => {
                let what = if matches!(target, Val::Null) { "null" } else { "undefined" };
                self.throw(
                    ErrorKind::TypeError,
                    format!("Cannot read properties of {} (reading '{}')", what, key),
                )
            }
            Val::Str(text) => {
                if key == "length" {
                    return Ok(Val::Num(text.encode_utf16().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(match text.encode_utf16().nth(index) {
                        Some(unit) => Val::string(String::from_utf16_lossy(&[unit])),
                        None => Val::Undefined,
                    });
                }
                let proto = self.realm.string_proto;
                self.get_from(proto, key, target)
            }
            Val::Num(_) => {
                let proto = self.realm.number_proto;
                self.get_from(proto, key, target)
            }
            Val::Bool(_) => {
                let proto = self.realm.boolean_proto;
                self.get_from(proto, key, target)
            }
            Val::Obj(id) => self.get_from(*id, key, target),
        }
    }

    /// `target[key]` with a computed key; arrays take a fast path for numbers
    pub(crate) fn get_computed(&mut self, target: &Val, key: &Val) -> EvalResult {
        if let (Val::Obj(id), Val::Num(n)) = (target, key) {
            if let ObjKind::Array(items) = &self.heap.get(*id).kind {
                if *n >= 0.0 && n.fract() == 0.0 {
                    let index = *n as usize;
                    if index < items.len() {
                        return Ok(items[index].clone());
                    }
                }
            }
        }
        let key = self.to_property_key(key)?;
        self.get(target, &key)
    }

    /// Walk the prototype chain from `start`, running getters against `receiver`
    pub(crate) fn get_from(&mut self, start: ObjId, key: &str, receiver: &Val) -> EvalResult {
        let mut current = Some(start);
        while let Some(id) = current {
            let obj = self.heap.get(id);
            if let ObjKind::Array(items) = &obj.kind {
                if key == "length" {
                    return Ok(Val::Num(items.len() as f64));
                }
                if let Some(index) = array_index(key) {
                    if let Some(item) = items.get(index) {
                        return Ok(item.clone());
                    }
                }
            }
            match obj.props.get(key) {
                Some(Prop::Data { value, .. }) => return Ok(value.clone()),
                Some(Prop::Accessor { get, .. }) => {
                    return match get.clone() {
                        Some(getter) => self.call(&getter, receiver.clone(), Vec::new()),
                        None => Ok(Val::Undefined),
                    };
                }
                None => current = obj.proto,
            }
        }
        Ok(Val::Undefined)
    }

    /// Own or inherited property presence (`in`)
    pub(crate) fn has_property(&self, start: ObjId, key: &str) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            if self.has_own_property(id, key) {
                return true;
            }
            current = self.heap.get(id).proto;
        }
        false
    }

    pub(crate) fn has_own_property(&self, id: ObjId, key: &str) -> bool {
        let obj = self.heap.get(id);
        if let ObjKind::Array(items) = &obj.kind {
            if key == "length" {
                return true;
            }
            if let Some(index) = array_index(key) {
                if index < items.len() {
                    return true;
                }
            }
        }
        obj.props.contains_key(key)
    }

    /* ===================== Property Write ===================== */

    /// `target[key] = value`
    pub(crate) fn set(&mut self, target: &Val, key: &str, value: Val) -> EvalResult<()> {
        let id = match target {
            Val::Obj(id) => *id,
            Val::Undefined | Val::Null => {
                let what = if matches!(target, Val::Null) { "null" } else { "undefined" };
                return self.throw(
                    ErrorKind::TypeError,
                    format!("Cannot set properties of {} (setting '{}')", what, key),
                );
            }
            primitive => {
                if self.strict {
                    let description = self.describe_value(primitive);
                    return self.throw(
                        ErrorKind::TypeError,
                        format!(
                            "Cannot create property '{}' on {} {}",
                            key,
                            self.type_of(primitive),
                            description
                        ),
                    );
                }
                return Ok(());
            }
        };

        if self.heap.get(id).frozen {
            if self.strict {
                return self.throw(
                    ErrorKind::TypeError,
                    format!("Cannot assign to read only property '{}' of object", key),
                );
            }
            return Ok(());
        }

        if matches!(self.heap.get(id).kind, ObjKind::Array(_)) {
            if key == "length" {
                let len = match value {
                    Val::Num(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => n as usize,
                    _ => return self.throw(ErrorKind::RangeError, "Invalid array length"),
                };
                if let ObjKind::Array(items) = &mut self.heap.get_mut(id).kind {
                    items.resize(len, Val::Undefined);
                }
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                if let ObjKind::Array(items) = &mut self.heap.get_mut(id).kind {
                    if index >= items.len() {
                        items.resize(index + 1, Val::Undefined);
                    }
                    items[index] = value;
                }
                return Ok(());
            }
        }

        // Setters anywhere on the chain intercept the write
        let mut current = Some(id);
        while let Some(holder) = current {
            let obj = self.heap.get(holder);
            match obj.props.get(key) {
                Some(Prop::Accessor { set, .. }) => {
                    return match set.clone() {
                        Some(setter) => self.call(&setter, target.clone(), vec![value]).map(|_| ()),
                        None if self.strict => self.throw(
                            ErrorKind::TypeError,
                            format!(
                                "Cannot set property {} of {} which has only a getter",
                                key,
                                self.describe_value(target)
                            ),
                        ),
                        None => Ok(()),
                    };
                }
                Some(Prop::Data { .. }) if holder == id => break,
                _ => current = obj.proto,
            }
        }

        let props = &mut self.heap.get_mut(id).props;
        match props.get_mut(key) {
            Some(Prop::Data { value: slot, .. }) => *slot = value,
            _ => {
                props.insert(key.to_string(), Prop::data(value));
            }
        }
        Ok(())
    }

    pub(crate) fn set_computed(&mut self, target: &Val, key: &Val, value: Val) -> EvalResult<()> {
        let key = self.to_property_key(key)?;
        self.set(target, &key, value)
    }

    /// `delete target[key]`
    pub(crate) fn delete_property(&mut self, target: &Val, key: &str) -> EvalResult<bool> {
        let id = match target {
            Val::Obj(id) => *id,
            Val::Undefined | Val::Null => {
                return self.throw(
                    ErrorKind::TypeError,
                    format!(
                        "Cannot convert undefined or null to object (deleting '{}')",
                        key
                    ),
                )
            }
            _ => return Ok(true),
        };
        if self.heap.get(id).frozen {
            if self.strict {
                return self.throw(
                    ErrorKind::TypeError,
                    format!("Cannot delete property '{}' of {}", key, self.describe_value(target)),
                );
            }
            return Ok(false);
        }
        let obj = self.heap.get_mut(id);
        if let ObjKind::Array(items) = &mut obj.kind {
            if key == "length" {
                return Ok(false);
            }
            if let Some(index) = array_index(key) {
                if let Some(slot) = items.get_mut(index) {
                    *slot = Val::Undefined;
                }
                return Ok(true);
            }
        }
        obj.props.shift_remove(key);
        Ok(true)
    }

    /* ===================== Keys ===================== */

    /// Own string keys in property order: array indices, then integer keys
    /// ascending, then the rest in insertion order
    pub(crate) fn own_keys(&self, id: ObjId, enumerable_only: bool) -> Vec<String> {
        let obj = self.heap.get(id);
        let mut keys = Vec::new();
        if let ObjKind::Array(items) = &obj.kind {
            keys.extend((0..items.len()).map(|index| index.to_string()));
        }

        let mut integers: Vec<(usize, &String)> = Vec::new();
        let mut names = Vec::new();
        for (key, prop) in &obj.props {
            if enumerable_only && !prop.is_enumerable() {
                continue;
            }
            match array_index(key) {
                Some(index) => integers.push((index, key)),
                None => names.push(key.clone()),
            }
        }
        integers.sort_by_key(|(index, _)| *index);
        keys.extend(integers.into_iter().map(|(_, key)| key.clone()));
        keys.extend(names);
        keys
    }

    /// Own enumerable `(key, value)` pairs, reading through getters
    pub(crate) fn own_entries(&mut self, value: &Val) -> EvalResult<Vec<(String, Val)>> {
        match value {
            Val::Obj(id) => {
                let keys = self.own_keys(*id, true);
                let mut entries = Vec::with_capacity(keys.len());
                for key in keys {
                    let item = self.get_from(*id, &key, value)?;
                    entries.push((key, item));
                }
                Ok(entries)
            }
            Val::Str(text) => Ok(text
                .encode_utf16()
                .enumerate()
                .map(|(index, unit)| {
                    (
                        index.to_string(),
                        Val::string(String::from_utf16_lossy(&[unit])),
                    )
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Keys visited by `for…in`: own then inherited enumerable keys
    pub(crate) fn for_in_keys(&self, value: &Val) -> Vec<String> {
        match value {
            Val::Obj(start) => {
                let mut keys: Vec<String> = Vec::new();
                let mut current = Some(*start);
                while let Some(id) = current {
                    for key in self.own_keys(id, true) {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                    current = self.heap.get(id).proto;
                }
                keys
            }
            Val::Str(text) => (0..text.encode_utf16().count())
                .map(|index| index.to_string())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Copy own enumerable properties of `source` onto `target` (spread, `Object.assign`)
    pub(crate) fn copy_properties(&mut self, target: ObjId, source: &Val) -> EvalResult<()> {
        for (key, value) in self.own_entries(source)? {
            self.set(&Val::Obj(target), &key, value)?;
        }
        Ok(())
    }

    /* ===================== Conversions ===================== */

    pub(crate) fn to_primitive(&mut self, value: &Val, hint: Hint) -> EvalResult {
        let Val::Obj(id) = value else {
            return Ok(value.clone());
        };
        let order = match hint {
            Hint::String => ["toString", "valueOf"],
            Hint::Default | Hint::Number => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_from(*id, name, value)?;
            if self.is_callable(&method) {
                let result = self.call(&method, value.clone(), Vec::new())?;
                if !matches!(result, Val::Obj(_)) {
                    return Ok(result);
                }
            }
        }
        self.throw(ErrorKind::TypeError, "Cannot convert object to primitive value")
    }

    /// ToString
    pub(crate) fn to_str(&mut self, value: &Val) -> EvalResult<Rc<str>> {
        Ok(match value {
            Val::Str(s) => s.clone(),
            Val::Undefined => "undefined".into(),
            Val::Null => "null".into(),
            Val::Bool(b) => Rc::from(if *b { "true" } else { "false" }),
            Val::Num(n) => number_to_string(*n).into(),
            Val::Obj(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                return self.to_str(&primitive);
            }
        })
    }

    pub(crate) fn to_string_lossy(&mut self, value: &Val) -> EvalResult<String> {
        Ok(self.to_str(value)?.to_string())
    }

    /// ToNumber
    pub(crate) fn to_number(&mut self, value: &Val) -> EvalResult<f64> {
        Ok(match value {
            Val::Undefined => f64::NAN,
            Val::Null => 0.0,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Num(n) => *n,
            Val::Str(s) => string_to_number(s),
            Val::Obj(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    /// ToIntegerOrInfinity
    pub(crate) fn to_integer(&mut self, value: &Val) -> EvalResult<f64> {
        let n = self.to_number(value)?;
        Ok(if n.is_nan() { 0.0 } else { n.trunc() })
    }

    pub(crate) fn to_property_key(&mut self, key: &Val) -> EvalResult<String> {
        match key {
            Val::Str(s) => Ok(s.to_string()),
            Val::Num(n) => Ok(number_to_string(*n)),
            other => self.to_string_lossy(other),
        }
    }

    /* ===================== Comparison ===================== */

    /// `==`
    pub(crate) fn loose_equals(&mut self, a: &Val, b: &Val) -> EvalResult<bool> {
        Ok(match (a, b) {
            (Val::Undefined | Val::Null, Val::Undefined | Val::Null) => true,
            (Val::Undefined | Val::Null, _) | (_, Val::Undefined | Val::Null) => false,
            (Val::Num(x), Val::Str(s)) | (Val::Str(s), Val::Num(x)) => *x == string_to_number(s),
            (Val::Bool(x), other) | (other, Val::Bool(x)) => {
                let n = Val::Num(if *x { 1.0 } else { 0.0 });
                return self.loose_equals(&n, other);
            }
            (Val::Obj(_), Val::Obj(_)) => strict_equals(a, b),
            (Val::Obj(_), primitive) | (primitive, Val::Obj(_)) => {
                let object = if matches!(a, Val::Obj(_)) { a } else { b };
                let converted = self.to_primitive(object, Hint::Default)?;
                return self.loose_equals(&converted, primitive);
            }
            _ => strict_equals(a, b),
        })
    }

    /// Abstract relational comparison; `None` when either side is NaN
    pub(crate) fn compare(&mut self, a: &Val, b: &Val) -> EvalResult<Option<Ordering>> {
        let a = self.to_primitive(a, Hint::Number)?;
        let b = self.to_primitive(b, Hint::Number)?;
        if let (Val::Str(x), Val::Str(y)) = (&a, &b) {
            return Ok(Some(x.encode_utf16().cmp(y.encode_utf16())));
        }
        let x = self.to_number(&a)?;
        let y = self.to_number(&b)?;
        Ok(x.partial_cmp(&y))
    }

    /// `value instanceof ctor`
    pub(crate) fn instance_of(&mut self, value: &Val, ctor: &Val) -> EvalResult<bool> {
        if !self.is_callable(ctor) {
            return self.throw(
                ErrorKind::TypeError,
                "Right-hand side of 'instanceof' is not callable",
            );
        }
        let Val::Obj(mut ctor_id) = *ctor else {
            return Ok(false);
        };
        if let ObjKind::Function(Func::Bound { target, .. }) = &self.heap.get(ctor_id).kind {
            ctor_id = *target;
        }
        let Val::Obj(id) = value else {
            return Ok(false);
        };
        let proto = match self.get_from(ctor_id, "prototype", ctor)? {
            Val::Obj(proto) => proto,
            _ => {
                return self.throw(
                    ErrorKind::TypeError,
                    "Function has non-object prototype in instanceof check",
                )
            }
        };
        let mut current = self.heap.get(*id).proto;
        while let Some(candidate) = current {
            if candidate == proto {
                return Ok(true);
            }
            current = self.heap.get(candidate).proto;
        }
        Ok(false)
    }

    /// Error for a value that cannot be iterated
    pub(crate) fn not_iterable<T>(&mut self, value: &Val) -> EvalResult<T> {
        let description = match value {
            Val::Undefined | Val::Null => self.describe_value(value),
            Val::Obj(_) if self.is_callable(value) => "function".to_string(),
            Val::Obj(_) => "object".to_string(),
            other => format!("{} {}", self.type_of(other), self.describe_value(other)),
        };
        self.throw(ErrorKind::TypeError, format!("{} is not iterable", description))
    }

    /// Values produced by iterating `value` (`for…of`, spread, destructuring)
    pub(crate) fn iterate(&mut self, value: &Val) -> EvalResult<Vec<Val>> {
        match value {
            Val::Str(text) => Ok(text.chars().map(|c| Val::string(c.to_string())).collect()),
            Val::Obj(id) => match &self.heap.get(*id).kind {
                ObjKind::Array(items) => Ok(items.clone()),
                ObjKind::Map(entries) => {
                    let pairs: Vec<(Val, Val)> = entries
                        .iter()
                        .map(|(key, item)| (key.to_val(), item.clone()))
                        .collect();
                    Ok(pairs
                        .into_iter()
                        .map(|(key, item)| self.alloc_array(vec![key, item]))
                        .collect())
                }
                ObjKind::Set(items) => Ok(items.iter().map(|key| key.to_val()).collect()),
                _ => self.not_iterable(value),
            },
            _ => self.not_iterable(value),
        }
    }
}
