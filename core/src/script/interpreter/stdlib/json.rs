//! `JSON.stringify` / `JSON.parse` on top of `serde_json`
//!
//! `serde_json` is built with `preserve_order`, so objects keep the property
//! order the interpreter hands it.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value as Json;

use super::super::control::EvalResult;
use super::super::realm::ErrorKind;
use super::super::values::{ObjId, ObjKind, Prop, Val};
use super::super::Interpreter;
use super::arg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFunc {
    Stringify,
    Parse,
}

impl<'c> Interpreter<'c> {
    pub(crate) fn json_func(&mut self, func: JsonFunc, args: Vec<Val>) -> EvalResult {
        match func {
            JsonFunc::Stringify => {
                let indent = match arg(&args, 2) {
                    Val::Num(n) if n >= 1.0 => Some(" ".repeat(n.min(10.0) as usize)),
                    Val::Str(s) if !s.is_empty() => Some(s.chars().take(10).collect()),
                    _ => None,
                };
                Ok(match self.stringify(&arg(&args, 0), indent.as_deref())? {
                    Some(text) => Val::string(text),
                    None => Val::Undefined,
                })
            }
            JsonFunc::Parse => {
                let text = self.to_str(&arg(&args, 0))?;
                match serde_json::from_str::<Json>(&text) {
                    Ok(json) => Ok(self.from_json(&json)),
                    Err(err) => self.throw(
                        ErrorKind::SyntaxError,
                        format!("Unexpected token in JSON at line {} column {}", err.line(), err.column()),
                    ),
                }
            }
        }
    }

    /// `JSON.stringify(value, null, indent)`; `None` where JS yields `undefined`
    pub(crate) fn stringify(&mut self, value: &Val, indent: Option<&str>) -> EvalResult<Option<String>> {
        let mut stack = Vec::new();
        let Some(json) = self.to_json(value, &mut stack)? else {
            return Ok(None);
        };
        let rendered = match indent {
            None => serde_json::to_string(&json),
            Some(indent) => {
                let mut buffer = Vec::new();
                let mut serializer = serde_json::Serializer::with_formatter(
                    &mut buffer,
                    PrettyFormatter::with_indent(indent.as_bytes()),
                );
                json.serialize(&mut serializer)
                    .map(|()| String::from_utf8_lossy(&buffer).into_owned())
            }
        };
        match rendered {
            Ok(text) => Ok(Some(text)),
            Err(err) => self.throw(ErrorKind::TypeError, err.to_string()),
        }
    }

    fn to_json(&mut self, value: &Val, stack: &mut Vec<ObjId>) -> EvalResult<Option<Json>> {
        if let Val::Obj(id) = value {
            let hook = self.get_from(*id, "toJSON", value)?;
            if self.is_callable(&hook) {
                let replaced = self.call(&hook, value.clone(), vec![Val::string("")])?;
                return self.to_json_value(&replaced, stack);
            }
        }
        self.to_json_value(value, stack)
    }

    fn to_json_value(&mut self, value: &Val, stack: &mut Vec<ObjId>) -> EvalResult<Option<Json>> {
        let id = match value {
            Val::Undefined => return Ok(None),
            Val::Null => return Ok(Some(Json::Null)),
            Val::Bool(b) => return Ok(Some(Json::Bool(*b))),
            Val::Num(n) => return Ok(Some(json_number(*n))),
            Val::Str(s) => return Ok(Some(Json::String(s.to_string()))),
            Val::Obj(_) if self.is_callable(value) => return Ok(None),
            Val::Obj(id) => *id,
        };

        if stack.contains(&id) {
            return self.throw(ErrorKind::TypeError, "Converting circular structure to JSON");
        }
        stack.push(id);

        let json = if let ObjKind::Array(items) = &self.heap.get(id).kind {
            let items = items.clone();
            let mut array = Vec::with_capacity(items.len());
            for item in &items {
                array.push(self.to_json(item, stack)?.unwrap_or(Json::Null));
            }
            Json::Array(array)
        } else {
            let mut object = serde_json::Map::new();
            for key in self.own_keys(id, true) {
                let item = self.get_from(id, &key, value)?;
                if let Some(json) = self.to_json(&item, stack)? {
                    object.insert(key, json);
                }
            }
            Json::Object(object)
        };

        stack.pop();
        Ok(Some(json))
    }

    pub(crate) fn from_json(&mut self, json: &Json) -> Val {
        match json {
            Json::Null => Val::Null,
            Json::Bool(b) => Val::Bool(*b),
            Json::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Val::string(s),
            Json::Array(items) => {
                let items = items.iter().map(|item| self.from_json(item)).collect();
                self.alloc_array(items)
            }
            Json::Object(entries) => {
                let id = self.alloc_object();
                for (key, item) in entries {
                    let item = self.from_json(item);
                    self.heap.define(id, key.clone(), Prop::data(item));
                }
                Val::Obj(id)
            }
        }
    }
}

/// Finite integers print without a fraction; non-finite numbers become `null`
fn json_number(n: f64) -> Json {
    if !n.is_finite() {
        Json::Null
    } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_number_rendering() {
        assert_eq!(json_number(3.0).to_string(), "3");
        assert_eq!(json_number(-0.0).to_string(), "0");
        assert_eq!(json_number(0.5).to_string(), "0.5");
        assert_eq!(json_number(f64::NAN), Json::Null);
        assert_eq!(json_number(f64::INFINITY), Json::Null);
    }
}
