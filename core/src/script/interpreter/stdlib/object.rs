//! `Object` statics, `Object.prototype` and `Function.prototype`

use super::super::control::EvalResult;
use super::super::realm::ErrorKind;
use super::super::values::{array_index, Func, FuncKind, ObjId, ObjKind, Prop, Val};
use super::super::Interpreter;
use super::arg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFunc {
    Keys,
    Values,
    Entries,
    Assign,
    Freeze,
    IsFrozen,
    FromEntries,
    Create,
    GetPrototypeOf,
    SetPrototypeOf,
    DefineProperty,
    DefineProperties,
    GetOwnPropertyNames,
    // Object.prototype
    HasOwnProperty,
    IsPrototypeOf,
    PropertyIsEnumerable,
    ToString,
    ValueOf,
}

pub const STATICS: &[(&str, ObjectFunc)] = &[
    ("keys", ObjectFunc::Keys),
    ("values", ObjectFunc::Values),
    ("entries", ObjectFunc::Entries),
    ("assign", ObjectFunc::Assign),
    ("freeze", ObjectFunc::Freeze),
    ("isFrozen", ObjectFunc::IsFrozen),
    ("fromEntries", ObjectFunc::FromEntries),
    ("create", ObjectFunc::Create),
    ("getPrototypeOf", ObjectFunc::GetPrototypeOf),
    ("setPrototypeOf", ObjectFunc::SetPrototypeOf),
    ("defineProperty", ObjectFunc::DefineProperty),
    ("defineProperties", ObjectFunc::DefineProperties),
    ("getOwnPropertyNames", ObjectFunc::GetOwnPropertyNames),
];

pub const PROTOTYPE: &[(&str, ObjectFunc)] = &[
    ("hasOwnProperty", ObjectFunc::HasOwnProperty),
    ("isPrototypeOf", ObjectFunc::IsPrototypeOf),
    ("propertyIsEnumerable", ObjectFunc::PropertyIsEnumerable),
    ("toString", ObjectFunc::ToString),
    ("valueOf", ObjectFunc::ValueOf),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionMethod {
    Call,
    Apply,
    Bind,
    ToString,
}

pub const FUNCTION_PROTOTYPE: &[(&str, FunctionMethod)] = &[
    ("call", FunctionMethod::Call),
    ("apply", FunctionMethod::Apply),
    ("bind", FunctionMethod::Bind),
    ("toString", FunctionMethod::ToString),
];

const NULLISH_TO_OBJECT: &str = "Cannot convert undefined or null to object";

impl<'c> Interpreter<'c> {
    pub(crate) fn object_func(&mut self, func: ObjectFunc, this: Val, args: Vec<Val>) -> EvalResult {
        let target = arg(&args, 0);
        match func {
            ObjectFunc::Keys | ObjectFunc::Values | ObjectFunc::Entries => {
                if target.is_nullish() {
                    return self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT);
                }
                let entries = self.own_entries(&target)?;
                Ok(match func {
                    ObjectFunc::Keys => {
                        let keys = entries.into_iter().map(|(key, _)| Val::string(key)).collect();
                        self.alloc_array(keys)
                    }
                    ObjectFunc::Values => {
                        let values = entries.into_iter().map(|(_, value)| value).collect();
                        self.alloc_array(values)
                    }
                    _ => {
                        let pairs = entries
                            .into_iter()
                            .map(|(key, value)| (Val::string(key), value))
                            .collect();
                        self.alloc_pairs(pairs)
                    }
                })
            }
            ObjectFunc::Assign => {
                let Val::Obj(id) = target else {
                    if target.is_nullish() {
                        return self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT);
                    }
                    return Ok(target);
                };
                for source in args.iter().skip(1) {
                    if !source.is_nullish() {
                        self.copy_properties(id, source)?;
                    }
                }
                Ok(target)
            }
            ObjectFunc::Freeze => {
                if let Val::Obj(id) = target {
                    self.heap.get_mut(id).frozen = true;
                }
                Ok(target)
            }
            ObjectFunc::IsFrozen => Ok(Val::Bool(match target {
                Val::Obj(id) => self.heap.get(id).frozen,
                _ => true,
            })),
            ObjectFunc::FromEntries => {
                let id = self.alloc_object();
                for entry in self.iterate(&target)? {
                    if !matches!(entry, Val::Obj(_)) {
                        let description = self.describe_value(&entry);
                        return self.throw(
                            ErrorKind::TypeError,
                            format!("Iterator value {} is not an entry object", description),
                        );
                    }
                    let key = self.get_computed(&entry, &Val::Num(0.0))?;
                    let value = self.get_computed(&entry, &Val::Num(1.0))?;
                    self.set_computed(&Val::Obj(id), &key, value)?;
                }
                Ok(Val::Obj(id))
            }
            ObjectFunc::Create => {
                let proto = match target {
                    Val::Obj(proto) => Some(proto),
                    Val::Null => None,
                    other => {
                        let description = self.describe_value(&other);
                        return self.throw(
                            ErrorKind::TypeError,
                            format!("Object prototype may only be an Object or null: {}", description),
                        );
                    }
                };
                let id = self.alloc_plain(proto);
                let properties = arg(&args, 1);
                if !matches!(properties, Val::Undefined) {
                    self.define_properties(id, &properties)?;
                }
                Ok(Val::Obj(id))
            }
            ObjectFunc::GetPrototypeOf => Ok(match target {
                Val::Undefined | Val::Null => {
                    return self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT)
                }
                Val::Obj(id) => self.heap.get(id).proto.map_or(Val::Null, Val::Obj),
                Val::Str(_) => Val::Obj(self.realm.string_proto),
                Val::Num(_) => Val::Obj(self.realm.number_proto),
                Val::Bool(_) => Val::Obj(self.realm.boolean_proto),
            }),
            ObjectFunc::SetPrototypeOf => {
                let proto = match arg(&args, 1) {
                    Val::Obj(proto) => Some(proto),
                    Val::Null => None,
                    other => {
                        let description = self.describe_value(&other);
                        return self.throw(
                            ErrorKind::TypeError,
                            format!("Object prototype may only be an Object or null: {}", description),
                        );
                    }
                };
                if let Val::Obj(id) = target {
                    if self.creates_cycle(id, proto) {
                        return self.throw(ErrorKind::TypeError, "Cyclic __proto__ value");
                    }
                    self.heap.get_mut(id).proto = proto;
                }
                Ok(target)
            }
            ObjectFunc::DefineProperty => {
                let Val::Obj(id) = target else {
                    return self.throw(
                        ErrorKind::TypeError,
                        "Object.defineProperty called on non-object",
                    );
                };
                let key = self.to_property_key(&arg(&args, 1))?;
                self.define_from_descriptor(id, &key, &arg(&args, 2))?;
                Ok(target)
            }
            ObjectFunc::DefineProperties => {
                let Val::Obj(id) = target else {
                    return self.throw(
                        ErrorKind::TypeError,
                        "Object.defineProperties called on non-object",
                    );
                };
                self.define_properties(id, &arg(&args, 1))?;
                Ok(target)
            }
            ObjectFunc::GetOwnPropertyNames => {
                let names = match &target {
                    Val::Undefined | Val::Null => {
                        return self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT)
                    }
                    Val::Obj(id) => {
                        let mut names = self.own_keys(*id, false);
                        if self.is_array(&target) {
                            names.push("length".to_string());
                        }
                        names
                    }
                    Val::Str(text) => {
                        let mut names: Vec<String> = (0..text.encode_utf16().count())
                            .map(|index| index.to_string())
                            .collect();
                        names.push("length".to_string());
                        names
                    }
                    _ => Vec::new(),
                };
                let names = names.into_iter().map(Val::string).collect();
                Ok(self.alloc_array(names))
            }
            ObjectFunc::HasOwnProperty => {
                let key = self.to_property_key(&target)?;
                match &this {
                    Val::Undefined | Val::Null => self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT),
                    Val::Obj(id) => Ok(Val::Bool(self.has_own_property(*id, &key))),
                    Val::Str(text) => Ok(Val::Bool(
                        key == "length"
                            || array_index(&key).is_some_and(|index| index < text.encode_utf16().count()),
                    )),
                    _ => Ok(Val::Bool(false)),
                }
            }
            ObjectFunc::IsPrototypeOf => {
                let (Val::Obj(proto), Val::Obj(start)) = (&this, &target) else {
                    return Ok(Val::Bool(false));
                };
                let mut current = self.heap.get(*start).proto;
                while let Some(id) = current {
                    if id == *proto {
                        return Ok(Val::Bool(true));
                    }
                    current = self.heap.get(id).proto;
                }
                Ok(Val::Bool(false))
            }
            ObjectFunc::PropertyIsEnumerable => {
                let key = self.to_property_key(&target)?;
                let Val::Obj(id) = this else {
                    return Ok(Val::Bool(false));
                };
                let obj = self.heap.get(id);
                let is_element = matches!(&obj.kind, ObjKind::Array(items)
                    if array_index(&key).is_some_and(|index| index < items.len()));
                Ok(Val::Bool(
                    is_element || obj.props.get(&key).is_some_and(Prop::is_enumerable),
                ))
            }
            ObjectFunc::ToString => Ok(Val::string(format!("[object {}]", self.class_of(&this)))),
            ObjectFunc::ValueOf => match this {
                Val::Undefined | Val::Null => self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT),
                other => Ok(other),
            },
        }
    }

    pub(crate) fn function_method(&mut self, method: FunctionMethod, this: Val, args: Vec<Val>) -> EvalResult {
        match method {
            FunctionMethod::Call => {
                let mut args = args.into_iter();
                let receiver = args.next().unwrap_or(Val::Undefined);
                self.call(&this, receiver, args.collect())
            }
            FunctionMethod::Apply => {
                let receiver = arg(&args, 0);
                let list = match arg(&args, 1) {
                    Val::Undefined | Val::Null => Vec::new(),
                    list @ Val::Obj(_) => self.list_from_array_like(&list)?,
                    _ => {
                        return self.throw(
                            ErrorKind::TypeError,
                            "CreateListFromArrayLike called on non-object",
                        )
                    }
                };
                self.call(&this, receiver, list)
            }
            FunctionMethod::Bind => {
                let mut args = args.into_iter();
                let receiver = args.next().unwrap_or(Val::Undefined);
                self.bind_function(&this, receiver, args.collect())
            }
            FunctionMethod::ToString => {
                let Val::Obj(id) = this else {
                    return self.throw(
                        ErrorKind::TypeError,
                        "Function.prototype.toString requires that 'this' be a Function",
                    );
                };
                let name = self.function_name(&this);
                match &self.heap.get(id).kind {
                    ObjKind::Function(Func::Script {
                        kind: FuncKind::ClassConstructor { .. },
                        ..
                    }) => Ok(Val::string(format!("class {} {{ }}", name))),
                    ObjKind::Function(_) => Ok(Val::string(format!(
                        "function {}() {{ [native code] }}",
                        name
                    ))),
                    _ => self.throw(
                        ErrorKind::TypeError,
                        "Function.prototype.toString requires that 'this' be a Function",
                    ),
                }
            }
        }
    }

    /* ===================== Helpers ===================== */

    /// Tag used by `Object.prototype.toString`
    fn class_of(&self, value: &Val) -> &'static str {
        match value {
            Val::Undefined => "Undefined",
            Val::Null => "Null",
            Val::Bool(_) => "Boolean",
            Val::Num(_) => "Number",
            Val::Str(_) => "String",
            Val::Obj(_) if self.is_array(value) => "Array",
            Val::Obj(_) if self.is_callable(value) => "Function",
            Val::Obj(id) => {
                let error_proto = self.realm.error_proto(ErrorKind::Error);
                let mut current = Some(*id);
                while let Some(candidate) = current {
                    if candidate == error_proto {
                        return "Error";
                    }
                    current = self.heap.get(candidate).proto;
                }
                "Object"
            }
        }
    }

    fn creates_cycle(&self, id: ObjId, proto: Option<ObjId>) -> bool {
        let mut current = proto;
        while let Some(candidate) = current {
            if candidate == id {
                return true;
            }
            current = self.heap.get(candidate).proto;
        }
        false
    }

    fn list_from_array_like(&mut self, list: &Val) -> EvalResult<Vec<Val>> {
        if let Some(items) = self.array_items(list) {
            return Ok(items);
        }
        let length = self.get(list, "length")?;
        let length = self.to_integer(&length)?.max(0.0);
        if length > u32::MAX as f64 {
            return self.throw(ErrorKind::RangeError, "Invalid array length");
        }
        let mut items = Vec::with_capacity(length as usize);
        for index in 0..length as usize {
            items.push(self.get_computed(list, &Val::Num(index as f64))?);
        }
        Ok(items)
    }

    fn define_properties(&mut self, id: ObjId, descriptors: &Val) -> EvalResult<()> {
        if descriptors.is_nullish() {
            return self.throw(ErrorKind::TypeError, NULLISH_TO_OBJECT);
        }
        for (key, descriptor) in self.own_entries(descriptors)? {
            self.define_from_descriptor(id, &key, &descriptor)?;
        }
        Ok(())
    }

    /// `Object.defineProperty`: `get`/`set`, `value` and `enumerable` are honored
    fn define_from_descriptor(&mut self, id: ObjId, key: &str, descriptor: &Val) -> EvalResult<()> {
        if !matches!(descriptor, Val::Obj(_)) {
            let description = self.describe_value(descriptor);
            return self.throw(
                ErrorKind::TypeError,
                format!("Property description must be an object: {}", description),
            );
        }
        if self.heap.get(id).frozen {
            return self.throw(
                ErrorKind::TypeError,
                format!("Cannot define property {}, object is not extensible", key),
            );
        }

        let getter = self.get(descriptor, "get")?;
        let setter = self.get(descriptor, "set")?;
        if !getter.is_nullish() || !setter.is_nullish() {
            for (role, accessor) in [("Getter", &getter), ("Setter", &setter)] {
                if !matches!(accessor, Val::Undefined) && !self.is_callable(accessor) {
                    let description = self.describe_value(accessor);
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("{} must be a function: {}", role, description),
                    );
                }
            }
            let callable = |value: Val| match value {
                Val::Undefined => None,
                other => Some(other),
            };
            self.heap.define(
                id,
                key,
                Prop::Accessor {
                    get: callable(getter),
                    set: callable(setter),
                },
            );
            return Ok(());
        }

        let value = self.get(descriptor, "value")?;
        if self.is_array(&Val::Obj(id)) && array_index(key).is_some() {
            return self.set(&Val::Obj(id), key, value);
        }
        let enumerable = self.get(descriptor, "enumerable")?.is_truthy();
        self.heap.define(id, key, Prop::Data { value, enumerable });
        Ok(())
    }
}
