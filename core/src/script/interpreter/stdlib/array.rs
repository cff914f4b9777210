//! `Array.prototype` methods and `Array` statics

use std::cmp::Ordering;

use super::super::control::EvalResult;
use super::super::realm::ErrorKind;
use super::super::values::{same_value_zero, strict_equals, ObjId, ObjKind, Val};
use super::super::Interpreter;
use super::{arg, relative_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Slice,
    Splice,
    Concat,
    Join,
    Reverse,
    IndexOf,
    LastIndexOf,
    Includes,
    Find,
    FindIndex,
    FindLast,
    FindLastIndex,
    Filter,
    Map,
    ForEach,
    Reduce,
    ReduceRight,
    Some,
    Every,
    Sort,
    Fill,
    Flat,
    FlatMap,
    At,
    Keys,
    Values,
    Entries,
    ToString,
    // Statics
    IsArray,
    From,
    Of,
}

pub const PROTOTYPE: &[(&str, ArrayMethod)] = &[
    ("push", ArrayMethod::Push),
    ("pop", ArrayMethod::Pop),
    ("shift", ArrayMethod::Shift),
    ("unshift", ArrayMethod::Unshift),
    ("slice", ArrayMethod::Slice),
    ("splice", ArrayMethod::Splice),
    ("concat", ArrayMethod::Concat),
    ("join", ArrayMethod::Join),
    ("reverse", ArrayMethod::Reverse),
    ("indexOf", ArrayMethod::IndexOf),
    ("lastIndexOf", ArrayMethod::LastIndexOf),
    ("includes", ArrayMethod::Includes),
    ("find", ArrayMethod::Find),
    ("findIndex", ArrayMethod::FindIndex),
    ("findLast", ArrayMethod::FindLast),
    ("findLastIndex", ArrayMethod::FindLastIndex),
    ("filter", ArrayMethod::Filter),
    ("map", ArrayMethod::Map),
    ("forEach", ArrayMethod::ForEach),
    ("reduce", ArrayMethod::Reduce),
    ("reduceRight", ArrayMethod::ReduceRight),
    ("some", ArrayMethod::Some),
    ("every", ArrayMethod::Every),
    ("sort", ArrayMethod::Sort),
    ("fill", ArrayMethod::Fill),
    ("flat", ArrayMethod::Flat),
    ("flatMap", ArrayMethod::FlatMap),
    ("at", ArrayMethod::At),
    ("keys", ArrayMethod::Keys),
    ("values", ArrayMethod::Values),
    ("entries", ArrayMethod::Entries),
    ("toString", ArrayMethod::ToString),
];

pub const STATICS: &[(&str, ArrayMethod)] = &[
    ("isArray", ArrayMethod::IsArray),
    ("from", ArrayMethod::From),
    ("of", ArrayMethod::Of),
];

impl ArrayMethod {
    fn name(self) -> &'static str {
        PROTOTYPE
            .iter()
            .chain(STATICS)
            .find(|(_, method)| *method == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }

    fn mutates(self) -> bool {
        matches!(
            self,
            ArrayMethod::Push
                | ArrayMethod::Pop
                | ArrayMethod::Shift
                | ArrayMethod::Unshift
                | ArrayMethod::Splice
                | ArrayMethod::Reverse
                | ArrayMethod::Sort
                | ArrayMethod::Fill
        )
    }
}

impl<'c> Interpreter<'c> {
    pub(crate) fn array_method(&mut self, method: ArrayMethod, this: Val, args: Vec<Val>) -> EvalResult {
        match method {
            ArrayMethod::IsArray => return Ok(Val::Bool(self.is_array(&arg(&args, 0)))),
            ArrayMethod::From => return self.array_from(args),
            ArrayMethod::Of => return Ok(self.alloc_array(args)),
            _ => {}
        }

        let id = match &this {
            Val::Obj(id) if self.is_array(&this) => *id,
            _ => {
                return self.throw(
                    ErrorKind::TypeError,
                    format!(
                        "Array.prototype.{} called on a value that is not an array",
                        method.name()
                    ),
                )
            }
        };
        if method.mutates() && self.heap.get(id).frozen {
            return self.throw(
                ErrorKind::TypeError,
                "Cannot assign to read only property 'length' of object '[object Array]'",
            );
        }
        let len = self.array_len(id);

        match method {
            ArrayMethod::Push => {
                let len = self.with_items(id, |items| {
                    items.extend(args);
                    items.len()
                });
                Ok(Val::Num(len as f64))
            }
            ArrayMethod::Pop => Ok(self
                .with_items(id, |items| items.pop())
                .unwrap_or(Val::Undefined)),
            ArrayMethod::Shift => Ok(self.with_items(id, |items| {
                if items.is_empty() {
                    Val::Undefined
                } else {
                    items.remove(0)
                }
            })),
            ArrayMethod::Unshift => {
                let len = self.with_items(id, |items| {
                    items.splice(0..0, args);
                    items.len()
                });
                Ok(Val::Num(len as f64))
            }
            ArrayMethod::Slice => {
                let start = self.range_arg(&arg(&args, 0), len, 0)?;
                let end = self.range_arg(&arg(&args, 1), len, len)?.max(start);
                let items = self.with_items(id, |items| items[start..end].to_vec());
                Ok(self.alloc_array(items))
            }
            ArrayMethod::Splice => {
                let start = self.range_arg(&arg(&args, 0), len, 0)?;
                let delete_count = match args.len() {
                    0 => 0,
                    1 => len - start,
                    _ => {
                        let count = self.to_integer(&args[1])?;
                        count.clamp(0.0, (len - start) as f64) as usize
                    }
                };
                let inserted: Vec<Val> = args.into_iter().skip(2).collect();
                let removed = self.with_items(id, |items| {
                    items
                        .splice(start..start + delete_count, inserted)
                        .collect::<Vec<_>>()
                });
                Ok(self.alloc_array(removed))
            }
            ArrayMethod::Concat => {
                let mut result = self.with_items(id, |items| items.clone());
                for value in args {
                    match self.array_items(&value) {
                        Some(items) => result.extend(items),
                        None => result.push(value),
                    }
                }
                Ok(self.alloc_array(result))
            }
            ArrayMethod::Join => {
                let separator = match arg(&args, 0) {
                    Val::Undefined => ",".into(),
                    value => self.to_str(&value)?,
                };
                Ok(Val::string(self.join(id, &separator)?))
            }
            ArrayMethod::ToString => Ok(Val::string(self.join(id, ",")?)),
            ArrayMethod::Reverse => {
                self.with_items(id, |items| items.reverse());
                Ok(Val::Obj(id))
            }
            ArrayMethod::IndexOf => {
                let target = arg(&args, 0);
                let from = self.range_arg(&arg(&args, 1), len, 0)?;
                let items = self.with_items(id, |items| items.clone());
                Ok(index_result(
                    (from..items.len()).find(|&index| strict_equals(&items[index], &target)),
                ))
            }
            ArrayMethod::LastIndexOf => {
                let target = arg(&args, 0);
                let from = match arg(&args, 1) {
                    Val::Undefined => len as f64 - 1.0,
                    value => {
                        let n = self.to_integer(&value)?;
                        if n < 0.0 {
                            len as f64 + n
                        } else {
                            n.min(len as f64 - 1.0)
                        }
                    }
                };
                if from < 0.0 {
                    return Ok(Val::Num(-1.0));
                }
                let items = self.with_items(id, |items| items.clone());
                Ok(index_result(
                    (0..=from as usize)
                        .rev()
                        .find(|&index| strict_equals(&items[index], &target)),
                ))
            }
            ArrayMethod::Includes => {
                let target = arg(&args, 0);
                let from = self.range_arg(&arg(&args, 1), len, 0)?;
                let items = self.with_items(id, |items| items.clone());
                Ok(Val::Bool(
                    items[from.min(items.len())..]
                        .iter()
                        .any(|item| same_value_zero(item, &target)),
                ))
            }
            ArrayMethod::Find | ArrayMethod::FindIndex => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                for index in 0..len {
                    let item = self.array_get(id, index);
                    if self.call_element(&callback, &this_arg, id, index)?.is_truthy() {
                        return Ok(match method {
                            ArrayMethod::Find => item,
                            _ => Val::Num(index as f64),
                        });
                    }
                }
                Ok(match method {
                    ArrayMethod::Find => Val::Undefined,
                    _ => Val::Num(-1.0),
                })
            }
            ArrayMethod::FindLast | ArrayMethod::FindLastIndex => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                for index in (0..len).rev() {
                    let item = self.array_get(id, index);
                    if self.call_element(&callback, &this_arg, id, index)?.is_truthy() {
                        return Ok(match method {
                            ArrayMethod::FindLast => item,
                            _ => Val::Num(index as f64),
                        });
                    }
                }
                Ok(match method {
                    ArrayMethod::FindLast => Val::Undefined,
                    _ => Val::Num(-1.0),
                })
            }
            ArrayMethod::Filter => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                let mut kept = Vec::new();
                for index in 0..len {
                    let item = self.array_get(id, index);
                    if self.call_element(&callback, &this_arg, id, index)?.is_truthy() {
                        kept.push(item);
                    }
                }
                Ok(self.alloc_array(kept))
            }
            ArrayMethod::Map => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                let mut mapped = Vec::with_capacity(len);
                for index in 0..len {
                    mapped.push(self.call_element(&callback, &this_arg, id, index)?);
                }
                Ok(self.alloc_array(mapped))
            }
            ArrayMethod::ForEach => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                for index in 0..len {
                    self.call_element(&callback, &this_arg, id, index)?;
                }
                Ok(Val::Undefined)
            }
            ArrayMethod::Some | ArrayMethod::Every => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                let wanted = method == ArrayMethod::Some;
                for index in 0..len {
                    if self.call_element(&callback, &this_arg, id, index)?.is_truthy() == wanted {
                        return Ok(Val::Bool(wanted));
                    }
                }
                Ok(Val::Bool(!wanted))
            }
            ArrayMethod::Reduce | ArrayMethod::ReduceRight => {
                let (callback, _) = self.callback_arg(&args)?;
                let mut order: Vec<usize> = (0..len).collect();
                if method == ArrayMethod::ReduceRight {
                    order.reverse();
                }
                let mut order = order.into_iter();
                let mut accumulator = if args.len() >= 2 {
                    args[1].clone()
                } else {
                    match order.next() {
                        Some(first) => self.array_get(id, first),
                        None => {
                            return self.throw(
                                ErrorKind::TypeError,
                                "Reduce of empty array with no initial value",
                            )
                        }
                    }
                };
                for index in order {
                    let item = self.array_get(id, index);
                    accumulator = self.call(
                        &callback,
                        Val::Undefined,
                        vec![accumulator, item, Val::Num(index as f64), Val::Obj(id)],
                    )?;
                }
                Ok(accumulator)
            }
            ArrayMethod::Sort => {
                let comparator = arg(&args, 0);
                if !matches!(comparator, Val::Undefined) && !self.is_callable(&comparator) {
                    return self.throw(
                        ErrorKind::TypeError,
                        "The comparison function must be either a function or undefined",
                    );
                }
                let items = self.with_items(id, |items| items.clone());
                let (defined, undefined): (Vec<Val>, Vec<Val>) = items
                    .into_iter()
                    .partition(|item| !matches!(item, Val::Undefined));
                let mut sorted = self.merge_sort(defined, &comparator)?;
                sorted.extend(undefined);
                self.with_items(id, |items| *items = sorted);
                Ok(Val::Obj(id))
            }
            ArrayMethod::Fill => {
                let value = arg(&args, 0);
                let start = self.range_arg(&arg(&args, 1), len, 0)?;
                let end = self.range_arg(&arg(&args, 2), len, len)?;
                self.with_items(id, |items| {
                    for item in items.iter_mut().take(end).skip(start) {
                        *item = value.clone();
                    }
                });
                Ok(Val::Obj(id))
            }
            ArrayMethod::Flat => {
                let depth = match arg(&args, 0) {
                    Val::Undefined => 1.0,
                    value => self.to_integer(&value)?,
                };
                let items = self.with_items(id, |items| items.clone());
                let mut flat = Vec::new();
                self.flatten_into(&items, depth, &mut flat);
                Ok(self.alloc_array(flat))
            }
            ArrayMethod::FlatMap => {
                let (callback, this_arg) = self.callback_arg(&args)?;
                let mut flat = Vec::new();
                for index in 0..len {
                    let mapped = self.call_element(&callback, &this_arg, id, index)?;
                    match self.array_items(&mapped) {
                        Some(items) => flat.extend(items),
                        None => flat.push(mapped),
                    }
                }
                Ok(self.alloc_array(flat))
            }
            ArrayMethod::At => {
                let n = self.to_integer(&arg(&args, 0))?;
                let index = if n < 0.0 { len as f64 + n } else { n };
                if index < 0.0 || index >= len as f64 {
                    return Ok(Val::Undefined);
                }
                Ok(self.array_get(id, index as usize))
            }
            ArrayMethod::Keys => {
                let keys = (0..len).map(|index| Val::Num(index as f64)).collect();
                Ok(self.alloc_array(keys))
            }
            ArrayMethod::Values => {
                let items = self.with_items(id, |items| items.clone());
                Ok(self.alloc_array(items))
            }
            ArrayMethod::Entries => {
                let items = self.with_items(id, |items| items.clone());
                let pairs = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (Val::Num(index as f64), item))
                    .collect();
                Ok(self.alloc_pairs(pairs))
            }
            ArrayMethod::IsArray | ArrayMethod::From | ArrayMethod::Of => Ok(Val::Undefined),
        }
    }

    /// `Array.from(source, mapFn)` over iterables and `{ length }` array-likes
    fn array_from(&mut self, args: Vec<Val>) -> EvalResult {
        let source = arg(&args, 0);
        let map_fn = arg(&args, 1);
        if !matches!(map_fn, Val::Undefined) && !self.is_callable(&map_fn) {
            let description = self.describe_value(&map_fn);
            return self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", description),
            );
        }

        let items = match &source {
            Val::Undefined | Val::Null => return self.not_iterable(&source),
            Val::Str(_) => self.iterate(&source)?,
            Val::Obj(id)
                if matches!(
                    self.heap.get(*id).kind,
                    ObjKind::Array(_) | ObjKind::Map(_) | ObjKind::Set(_)
                ) =>
            {
                self.iterate(&source)?
            }
            Val::Obj(_) => {
                let length = self.get(&source, "length")?;
                let length = self.to_integer(&length)?.max(0.0);
                if length > u32::MAX as f64 {
                    return self.throw(ErrorKind::RangeError, "Invalid array length");
                }
                let mut items = Vec::with_capacity(length as usize);
                for index in 0..length as usize {
                    items.push(self.get_computed(&source, &Val::Num(index as f64))?);
                }
                items
            }
            _ => Vec::new(),
        };

        if matches!(map_fn, Val::Undefined) {
            return Ok(self.alloc_array(items));
        }
        let mut mapped = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            mapped.push(self.call(&map_fn, Val::Undefined, vec![item, Val::Num(index as f64)])?);
        }
        Ok(self.alloc_array(mapped))
    }

    /* ===================== Helpers ===================== */

    fn with_items<T>(&mut self, id: ObjId, f: impl FnOnce(&mut Vec<Val>) -> T) -> T {
        match &mut self.heap.get_mut(id).kind {
            ObjKind::Array(items) => f(items),
            _ => f(&mut Vec::new()),
        }
    }

    /// Relative position argument; `default` when absent
    fn range_arg(&mut self, value: &Val, len: usize, default: usize) -> EvalResult<usize> {
        match value {
            Val::Undefined => Ok(default),
            other => Ok(relative_index(self.to_integer(other)?, len)),
        }
    }

    fn callback_arg(&mut self, args: &[Val]) -> EvalResult<(Val, Val)> {
        let callback = arg(args, 0);
        if !self.is_callable(&callback) {
            let description = self.describe_value(&callback);
            return self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", description),
            );
        }
        Ok((callback, arg(args, 1)))
    }

    /// `callback.call(this_arg, array[index], index, array)`
    fn call_element(&mut self, callback: &Val, this_arg: &Val, id: ObjId, index: usize) -> EvalResult {
        let item = self.array_get(id, index);
        self.call(
            callback,
            this_arg.clone(),
            vec![item, Val::Num(index as f64), Val::Obj(id)],
        )
    }

    fn join(&mut self, id: ObjId, separator: &str) -> EvalResult<String> {
        if self.joining.contains(&id) {
            return Ok(String::new());
        }
        self.joining.push(id);
        let result = self.join_items(id, separator);
        self.joining.pop();
        result
    }

    fn join_items(&mut self, id: ObjId, separator: &str) -> EvalResult<String> {
        let mut joined = String::new();
        for index in 0..self.array_len(id) {
            if index > 0 {
                joined.push_str(separator);
            }
            match self.array_get(id, index) {
                Val::Undefined | Val::Null => {}
                item => joined.push_str(&self.to_str(&item)?),
            }
        }
        Ok(joined)
    }

    fn flatten_into(&self, items: &[Val], depth: f64, out: &mut Vec<Val>) {
        for item in items {
            match self.array_items(item) {
                Some(nested) if depth >= 1.0 => self.flatten_into(&nested, depth - 1.0, out),
                _ => out.push(item.clone()),
            }
        }
    }

    /// Stable merge sort; comparator errors abort the sort
    fn merge_sort(&mut self, mut items: Vec<Val>, comparator: &Val) -> EvalResult<Vec<Val>> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let right = items.split_off(items.len() / 2);
        let left = self.merge_sort(items, comparator)?;
        let right = self.merge_sort(right, comparator)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            if self.sort_compare(&right[j], &left[i], comparator)? == Ordering::Less {
                merged.push(right[j].clone());
                j += 1;
            } else {
                merged.push(left[i].clone());
                i += 1;
            }
        }
        merged.extend_from_slice(&left[i..]);
        merged.extend_from_slice(&right[j..]);
        Ok(merged)
    }

    fn sort_compare(&mut self, a: &Val, b: &Val, comparator: &Val) -> EvalResult<Ordering> {
        if self.is_callable(comparator) {
            let result = self.call(comparator, Val::Undefined, vec![a.clone(), b.clone()])?;
            let n = self.to_number(&result)?;
            return Ok(if n < 0.0 {
                Ordering::Less
            } else if n > 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            });
        }
        let a = self.to_str(a)?;
        let b = self.to_str(b)?;
        Ok(a.encode_utf16().cmp(b.encode_utf16()))
    }
}

fn index_result(found: Option<usize>) -> Val {
    Val::Num(found.map_or(-1.0, |index| index as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_resolve() {
        assert_eq!(ArrayMethod::FlatMap.name(), "flatMap");
        assert_eq!(ArrayMethod::From.name(), "from");
        assert!(ArrayMethod::Sort.mutates());
        assert!(!ArrayMethod::Slice.mutates());
    }
}
