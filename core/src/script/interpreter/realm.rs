//! Intrinsic objects and the global environment
//!
//! Every evaluation bootstraps a fresh realm, so nothing one snippet does to
//! a built-in leaks into the next run.

use super::scope::{Binding, ScopeRef};
use super::stdlib::{
    array, collections, math, number, object, string, BooleanMethod, ConsoleMethod, Ctor,
    GlobalFunc, JsonFunc, MapMethod, Native, SetMethod,
};
use super::values::{Func, Heap, HeapObj, ObjId, ObjKind, Prop, Val};

/// Built-in error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// Ids of the intrinsic prototypes the evaluator needs directly
#[derive(Debug, Clone)]
pub struct Realm {
    pub object_proto: ObjId,
    pub function_proto: ObjId,
    pub array_proto: ObjId,
    pub string_proto: ObjId,
    pub number_proto: ObjId,
    pub boolean_proto: ObjId,
    pub map_proto: ObjId,
    pub set_proto: ObjId,
    error_protos: Vec<(ErrorKind, ObjId)>,
}

impl Realm {
    pub fn error_proto(&self, kind: ErrorKind) -> ObjId {
        self.error_protos
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .unwrap_or(self.object_proto)
    }

    /// Allocate the intrinsics and declare the globals in `global`
    pub fn bootstrap(heap: &mut Heap, global: &ScopeRef) -> Self {
        let object_proto = heap.alloc(HeapObj::plain(None));
        let function_proto = heap.alloc(HeapObj::plain(Some(object_proto)));
        let mut builder = RealmBuilder {
            heap,
            object_proto,
            function_proto,
        };

        builder.methods(object_proto, object::PROTOTYPE, Native::Object);
        builder.methods(function_proto, object::FUNCTION_PROTOTYPE, Native::Function);

        let object_ctor = builder.constructor("Object", Ctor::Object, object_proto);
        builder.methods(object_ctor, object::STATICS, Native::Object);

        let array_proto = builder.object();
        builder.methods(array_proto, array::PROTOTYPE, Native::Array);
        let array_ctor = builder.constructor("Array", Ctor::Array, array_proto);
        builder.methods(array_ctor, array::STATICS, Native::Array);

        let string_proto = builder.object();
        builder.methods(string_proto, string::PROTOTYPE, Native::String);
        let string_ctor = builder.constructor("String", Ctor::String, string_proto);
        builder.methods(string_ctor, string::STATICS, Native::String);

        let number_proto = builder.object();
        builder.methods(number_proto, number::PROTOTYPE, Native::Number);
        let number_ctor = builder.constructor("Number", Ctor::Number, number_proto);
        builder.methods(number_ctor, number::STATICS, Native::Number);
        builder.native(number_ctor, "parseFloat", Native::Global(GlobalFunc::ParseFloat));
        builder.native(number_ctor, "parseInt", Native::Global(GlobalFunc::ParseInt));
        for (name, value) in number::CONSTANTS {
            builder.heap.define(number_ctor, *name, Prop::hidden(Val::Num(*value)));
        }

        let boolean_proto = builder.object();
        builder.native(
            boolean_proto,
            "toString",
            Native::Boolean(BooleanMethod::ToString),
        );
        builder.native(boolean_proto, "valueOf", Native::Boolean(BooleanMethod::ValueOf));
        let boolean_ctor = builder.constructor("Boolean", Ctor::Boolean, boolean_proto);

        let map_proto = builder.object();
        builder.methods(map_proto, collections::MAP_PROTOTYPE, Native::Map);
        builder.getter(map_proto, "size", Native::Map(MapMethod::Size));
        let map_ctor = builder.constructor("Map", Ctor::Map, map_proto);

        let set_proto = builder.object();
        builder.methods(set_proto, collections::SET_PROTOTYPE, Native::Set);
        builder.getter(set_proto, "size", Native::Set(SetMethod::Size));
        let set_ctor = builder.constructor("Set", Ctor::Set, set_proto);

        let mut error_protos = Vec::new();
        let mut error_ctors = Vec::new();
        let mut base_error: Option<(ObjId, ObjId)> = None;
        for kind in ErrorKind::ALL {
            let proto = match base_error {
                Some((base_proto, _)) => builder.heap.alloc(HeapObj::plain(Some(base_proto))),
                None => builder.object(),
            };
            builder
                .heap
                .define(proto, "name", Prop::hidden(Val::string(kind.name())));
            builder
                .heap
                .define(proto, "message", Prop::hidden(Val::string("")));
            let ctor = builder.constructor(kind.name(), Ctor::Error(kind), proto);
            match base_error {
                // Subclass constructors inherit from Error itself
                Some((_, base_ctor)) => builder.heap.get_mut(ctor).proto = Some(base_ctor),
                None => {
                    builder.native(proto, "toString", Native::Global(GlobalFunc::ErrorToString));
                    builder.native(
                        ctor,
                        "captureStackTrace",
                        Native::Global(GlobalFunc::CaptureStackTrace),
                    );
                    base_error = Some((proto, ctor));
                }
            }
            error_protos.push((kind, proto));
            error_ctors.push((kind.name(), ctor));
        }

        let console = builder.object();
        builder.native(console, "log", Native::Console(ConsoleMethod::Log));
        builder.native(console, "error", Native::Console(ConsoleMethod::Error));

        let math_obj = builder.object();
        builder.methods(math_obj, math::FUNCTIONS, Native::Math);
        for (name, value) in math::CONSTANTS {
            builder.heap.define(math_obj, *name, Prop::hidden(Val::Num(*value)));
        }

        let json = builder.object();
        builder.native(json, "stringify", Native::Json(JsonFunc::Stringify));
        builder.native(json, "parse", Native::Json(JsonFunc::Parse));

        let parse_int = builder.function("parseInt", Native::Global(GlobalFunc::ParseInt));
        let parse_float = builder.function("parseFloat", Native::Global(GlobalFunc::ParseFloat));
        let is_nan = builder.function("isNaN", Native::Global(GlobalFunc::IsNaN));
        let is_finite = builder.function("isFinite", Native::Global(GlobalFunc::IsFinite));

        let mut scope = global.borrow_mut();
        let mut declare = |name: &str, id: ObjId| scope.declare(name, Binding::var(Val::Obj(id)));
        declare("console", console);
        declare("Math", math_obj);
        declare("JSON", json);
        declare("Object", object_ctor);
        declare("Array", array_ctor);
        declare("String", string_ctor);
        declare("Number", number_ctor);
        declare("Boolean", boolean_ctor);
        declare("Map", map_ctor);
        declare("Set", set_ctor);
        declare("parseInt", parse_int);
        declare("parseFloat", parse_float);
        declare("isNaN", is_nan);
        declare("isFinite", is_finite);
        for (name, ctor) in error_ctors {
            declare(name, ctor);
        }
        for (name, value) in [
            ("undefined", Val::Undefined),
            ("NaN", Val::Num(f64::NAN)),
            ("Infinity", Val::Num(f64::INFINITY)),
        ] {
            scope.declare(
                name,
                Binding {
                    value,
                    mutable: false,
                    initialized: true,
                },
            );
        }

        Realm {
            object_proto,
            function_proto,
            array_proto,
            string_proto,
            number_proto,
            boolean_proto,
            map_proto,
            set_proto,
            error_protos,
        }
    }
}

/* ===================== Builder ===================== */

struct RealmBuilder<'h> {
    heap: &'h mut Heap,
    object_proto: ObjId,
    function_proto: ObjId,
}

impl<'h> RealmBuilder<'h> {
    fn object(&mut self) -> ObjId {
        self.heap.alloc(HeapObj::plain(Some(self.object_proto)))
    }

    fn function(&mut self, name: &str, native: Native) -> ObjId {
        let mut obj = HeapObj::new(
            ObjKind::Function(Func::Native(native)),
            Some(self.function_proto),
        );
        obj.props
            .insert("name".to_string(), Prop::hidden(Val::string(name)));
        self.heap.alloc(obj)
    }

    fn native(&mut self, target: ObjId, name: &str, native: Native) {
        let func = self.function(name, native);
        self.heap.define(target, name, Prop::hidden(Val::Obj(func)));
    }

    fn getter(&mut self, target: ObjId, name: &str, native: Native) {
        let func = self.function(name, native);
        self.heap.define(
            target,
            name,
            Prop::Accessor {
                get: Some(Val::Obj(func)),
                set: None,
            },
        );
    }

    fn methods<M: Copy>(&mut self, target: ObjId, table: &[(&str, M)], wrap: fn(M) -> Native) {
        for (name, method) in table {
            self.native(target, name, wrap(*method));
        }
    }

    fn constructor(&mut self, name: &str, ctor: Ctor, proto: ObjId) -> ObjId {
        let func = self.function(name, Native::Ctor(ctor));
        self.heap
            .define(func, "prototype", Prop::hidden(Val::Obj(proto)));
        self.heap
            .define(proto, "constructor", Prop::hidden(Val::Obj(func)));
        func
    }
}
