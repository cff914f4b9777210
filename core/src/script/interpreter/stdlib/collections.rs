//! `Map` and `Set`
//!
//! Both keep insertion order and compare keys with SameValueZero through
//! [`MapKey`]. `keys()`, `values()` and `entries()` return arrays.

use indexmap::{IndexMap, IndexSet};

use super::super::control::EvalResult;
use super::super::realm::ErrorKind;
use super::super::values::{HeapObj, MapKey, ObjId, ObjKind, Val};
use super::super::Interpreter;
use super::arg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMethod {
    Get,
    Set,
    Has,
    Delete,
    Clear,
    ForEach,
    Keys,
    Values,
    Entries,
    Size,
}

pub const MAP_PROTOTYPE: &[(&str, MapMethod)] = &[
    ("get", MapMethod::Get),
    ("set", MapMethod::Set),
    ("has", MapMethod::Has),
    ("delete", MapMethod::Delete),
    ("clear", MapMethod::Clear),
    ("forEach", MapMethod::ForEach),
    ("keys", MapMethod::Keys),
    ("values", MapMethod::Values),
    ("entries", MapMethod::Entries),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMethod {
    Add,
    Has,
    Delete,
    Clear,
    ForEach,
    Values,
    Entries,
    Size,
}

pub const SET_PROTOTYPE: &[(&str, SetMethod)] = &[
    ("add", SetMethod::Add),
    ("has", SetMethod::Has),
    ("delete", SetMethod::Delete),
    ("clear", SetMethod::Clear),
    ("forEach", SetMethod::ForEach),
    ("values", SetMethod::Values),
    ("keys", SetMethod::Values),
    ("entries", SetMethod::Entries),
];

fn method_name<M: PartialEq + Copy>(table: &[(&'static str, M)], method: M) -> &'static str {
    table
        .iter()
        .find(|(_, candidate)| *candidate == method)
        .map_or("size", |(name, _)| *name)
}

impl<'c> Interpreter<'c> {
    /* ===================== Constructors ===================== */

    pub(crate) fn construct_map(&mut self, args: Vec<Val>, new_target: ObjId) -> EvalResult {
        let proto = self.prototype_for(new_target, self.realm.map_proto)?;
        let id = self
            .heap
            .alloc(HeapObj::new(ObjKind::Map(IndexMap::new()), Some(proto)));

        let source = arg(&args, 0);
        if !source.is_nullish() {
            for entry in self.iterate(&source)? {
                if !matches!(entry, Val::Obj(_)) {
                    let description = self.describe_value(&entry);
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("Iterator value {} is not an entry object", description),
                    );
                }
                let key = self.get_computed(&entry, &Val::Num(0.0))?;
                let value = self.get_computed(&entry, &Val::Num(1.0))?;
                if let ObjKind::Map(entries) = &mut self.heap.get_mut(id).kind {
                    entries.insert(MapKey::from_val(&key), value);
                }
            }
        }
        Ok(Val::Obj(id))
    }

    pub(crate) fn construct_set(&mut self, args: Vec<Val>, new_target: ObjId) -> EvalResult {
        let proto = self.prototype_for(new_target, self.realm.set_proto)?;
        let source = arg(&args, 0);
        let items = if source.is_nullish() {
            Vec::new()
        } else {
            self.iterate(&source)?
        };
        let set: IndexSet<MapKey> = items.iter().map(MapKey::from_val).collect();
        Ok(Val::Obj(self.heap.alloc(HeapObj::new(ObjKind::Set(set), Some(proto)))))
    }

    /* ===================== Map.prototype ===================== */

    pub(crate) fn map_method(&mut self, method: MapMethod, this: Val, args: Vec<Val>) -> EvalResult {
        let id = match &this {
            Val::Obj(id) if matches!(self.heap.get(*id).kind, ObjKind::Map(_)) => *id,
            _ => {
                let description = self.describe_value(&this);
                return self.throw(
                    ErrorKind::TypeError,
                    format!(
                        "Method Map.prototype.{} called on incompatible receiver {}",
                        method_name(MAP_PROTOTYPE, method),
                        description
                    ),
                );
            }
        };
        let key = MapKey::from_val(&arg(&args, 0));

        if method == MapMethod::ForEach {
            let callback = self.collection_callback(&args)?;
            let this_arg = arg(&args, 1);
            let mut index = 0;
            // Entries added during iteration are visited
            while let Some((key, value)) = self.map_entry(id, index) {
                self.call(&callback, this_arg.clone(), vec![value, key, Val::Obj(id)])?;
                index += 1;
            }
            return Ok(Val::Undefined);
        }

        let ObjKind::Map(entries) = &mut self.heap.get_mut(id).kind else {
            return Ok(Val::Undefined);
        };
        Ok(match method {
            MapMethod::Get => entries.get(&key).cloned().unwrap_or(Val::Undefined),
            MapMethod::Set => {
                entries.insert(key, arg(&args, 1));
                this
            }
            MapMethod::Has => Val::Bool(entries.contains_key(&key)),
            MapMethod::Delete => Val::Bool(entries.shift_remove(&key).is_some()),
            MapMethod::Clear => {
                entries.clear();
                Val::Undefined
            }
            MapMethod::Size => Val::Num(entries.len() as f64),
            MapMethod::Keys => {
                let keys = entries.keys().map(MapKey::to_val).collect();
                self.alloc_array(keys)
            }
            MapMethod::Values => {
                let values = entries.values().cloned().collect();
                self.alloc_array(values)
            }
            MapMethod::Entries => {
                let pairs = entries
                    .iter()
                    .map(|(key, value)| (key.to_val(), value.clone()))
                    .collect();
                self.alloc_pairs(pairs)
            }
            MapMethod::ForEach => Val::Undefined,
        })
    }

    fn map_entry(&self, id: ObjId, index: usize) -> Option<(Val, Val)> {
        match &self.heap.get(id).kind {
            ObjKind::Map(entries) => entries
                .get_index(index)
                .map(|(key, value)| (key.to_val(), value.clone())),
            _ => None,
        }
    }

    /* ===================== Set.prototype ===================== */

    pub(crate) fn set_method(&mut self, method: SetMethod, this: Val, args: Vec<Val>) -> EvalResult {
        let id = match &this {
            Val::Obj(id) if matches!(self.heap.get(*id).kind, ObjKind::Set(_)) => *id,
            _ => {
                let description = self.describe_value(&this);
                return self.throw(
                    ErrorKind::TypeError,
                    format!(
                        "Method Set.prototype.{} called on incompatible receiver {}",
                        method_name(SET_PROTOTYPE, method),
                        description
                    ),
                );
            }
        };
        let key = MapKey::from_val(&arg(&args, 0));

        if method == SetMethod::ForEach {
            let callback = self.collection_callback(&args)?;
            let this_arg = arg(&args, 1);
            let mut index = 0;
            while let Some(value) = self.set_entry(id, index) {
                self.call(
                    &callback,
                    this_arg.clone(),
                    vec![value.clone(), value, Val::Obj(id)],
                )?;
                index += 1;
            }
            return Ok(Val::Undefined);
        }

        let ObjKind::Set(items) = &mut self.heap.get_mut(id).kind else {
            return Ok(Val::Undefined);
        };
        Ok(match method {
            SetMethod::Add => {
                items.insert(key);
                this
            }
            SetMethod::Has => Val::Bool(items.contains(&key)),
            SetMethod::Delete => Val::Bool(items.shift_remove(&key)),
            SetMethod::Clear => {
                items.clear();
                Val::Undefined
            }
            SetMethod::Size => Val::Num(items.len() as f64),
            SetMethod::Values => {
                let values = items.iter().map(MapKey::to_val).collect();
                self.alloc_array(values)
            }
            SetMethod::Entries => {
                let pairs = items
                    .iter()
                    .map(|item| (item.to_val(), item.to_val()))
                    .collect();
                self.alloc_pairs(pairs)
            }
            SetMethod::ForEach => Val::Undefined,
        })
    }

    fn set_entry(&self, id: ObjId, index: usize) -> Option<Val> {
        match &self.heap.get(id).kind {
            ObjKind::Set(items) => items.get_index(index).map(MapKey::to_val),
            _ => None,
        }
    }

    fn collection_callback(&mut self, args: &[Val]) -> EvalResult<Val> {
        let callback = arg(args, 0);
        if !self.is_callable(&callback) {
            let description = self.describe_value(&callback);
            return self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", description),
            );
        }
        Ok(callback)
    }
}
