//! Built-in function implementations for the standard library
//!
//! Every builtin is a native registered under a stable id (`"Object.create"`,
//! `"Array.prototype.push"`, ...). Function objects only record that id, so
//! the builtins table can be rebuilt identically on every start and a
//! snapshot can refer to natives by name.

pub mod array;
pub mod console;
pub mod error;
pub mod function;
pub mod global;
pub mod internal;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod string;
pub mod thread;

use crate::error::JsError;
use crate::interpreter::native::{native, NativeCall, NativeFn, NativeResult};
use crate::interpreter::Interpreter;
use crate::value::{JsFunction, JsObject, JsValue, ObjectClass, ObjectId, Property};

/// Builtin that completes synchronously
pub type BuiltinFn = fn(&mut Interpreter, &mut NativeCall) -> Result<JsValue, JsError>;

/// Builtin that may re-enter, block or sleep
pub type ResumableFn = fn(&mut Interpreter, &mut NativeCall) -> Result<NativeResult, JsError>;

/// Adapt a synchronous builtin to the native protocol
pub(crate) fn builtin(f: BuiltinFn) -> NativeFn {
    native(move |interp, call| f(interp, call).map(NativeResult::Value))
}

/// Create the builtin prototypes, constructors and globals
pub fn init_builtins(interp: &mut Interpreter) -> Result<(), JsError> {
    let root = Some(interp.root_owner());

    let object_proto = interp.create_object(None, root);
    interp.set_builtin("Object.prototype", JsValue::Object(object_proto));

    // Function.prototype is itself callable and returns undefined
    interp.register_native(
        "Function.prototype",
        0,
        native(|_, _| Ok(NativeResult::Value(JsValue::Undefined))),
        None,
    );
    let mut function_proto = JsObject::new(ObjectClass::Function, Some(object_proto), root);
    function_proto.function = Some(JsFunction::Native {
        id: "Function.prototype".into(),
    });
    function_proto.insert("length", Property::frozen(JsValue::from(0)));
    function_proto.insert("name", Property::frozen(JsValue::from("")));
    let function_proto = interp.alloc(function_proto);
    interp.set_builtin("Function.prototype", JsValue::Object(function_proto));

    let mut array_proto = JsObject::new(ObjectClass::Array, Some(object_proto), root);
    array_proto.insert("length", Property::with_flags(JsValue::from(0), true, false, false));
    let array_proto = interp.alloc(array_proto);
    interp.set_builtin("Array.prototype", JsValue::Object(array_proto));

    for name in ["String.prototype", "Number.prototype", "Boolean.prototype"] {
        let proto = interp.create_object(Some(object_proto), root);
        interp.set_builtin(name, JsValue::Object(proto));
    }

    internal::init_internal(interp)?;
    object::init_object(interp)?;
    function::init_function(interp)?;
    array::init_array(interp)?;
    error::init_error(interp)?;
    string::init_string(interp)?;
    number::init_number(interp)?;
    math::init_math(interp)?;
    json::init_json(interp)?;
    console::init_console(interp)?;
    global::init_global(interp)?;
    thread::init_thread(interp)?;
    tracing::debug!(natives = interp.native_ids().len(), "builtins initialized");
    Ok(())
}

/// The root owner object was created before `Object.prototype` existed
pub fn link_root_owner(interp: &mut Interpreter) -> Result<(), JsError> {
    let object_proto = interp.builtin_object("Object.prototype")?;
    let root = interp.root_owner().0;
    interp.object_mut(root)?.prototype = Some(object_proto);
    Ok(())
}

/// The object a builtin was called on, or a TypeError naming the method
pub(crate) fn this_object(call: &NativeCall, method: &str) -> Result<ObjectId, JsError> {
    call.this
        .as_object()
        .ok_or_else(|| JsError::type_error(format!("{} called on non-object", method)))
}

/// An object argument, or a TypeError naming the method
pub(crate) fn object_arg(call: &NativeCall, index: usize, method: &str) -> Result<ObjectId, JsError> {
    call.arg(index)
        .as_object()
        .ok_or_else(|| JsError::type_error(format!("{} called on non-object", method)))
}

impl Interpreter {
    /// Register `f` as `<path>.<name>` and attach it to `target`
    pub(crate) fn register_method(
        &mut self,
        target: ObjectId,
        path: &str,
        name: &str,
        f: BuiltinFn,
        arity: u32,
    ) -> Result<ObjectId, JsError> {
        self.attach_native(target, path, name, builtin(f), arity)
    }

    /// Like [`Interpreter::register_method`], for builtins that use the
    /// re-entrant protocol
    pub(crate) fn register_resumable(
        &mut self,
        target: ObjectId,
        path: &str,
        name: &str,
        f: ResumableFn,
        arity: u32,
    ) -> Result<ObjectId, JsError> {
        self.attach_native(target, path, name, native(f), arity)
    }

    fn attach_native(
        &mut self,
        target: ObjectId,
        path: &str,
        name: &str,
        f: NativeFn,
        arity: u32,
    ) -> Result<ObjectId, JsError> {
        let id = format!("{}.{}", path, name);
        self.register_native(id.as_str(), arity, f, None);
        let func = self.create_native_function(&id, name)?;
        self.object_mut(target)?
            .insert(name, Property::hidden(JsValue::Object(func)));
        Ok(func)
    }

    /// Create the global constructor `name`, linked both ways with the
    /// prototype registered as `"<name>.prototype"`
    pub(crate) fn register_constructor(
        &mut self,
        name: &str,
        call: NativeFn,
        construct: Option<NativeFn>,
        arity: u32,
    ) -> Result<ObjectId, JsError> {
        self.register_native(name, arity, call, construct);
        let func = self.create_native_function(name, name)?;
        let proto = self.builtin_object(&format!("{}.prototype", name))?;
        self.object_mut(func)?
            .insert("prototype", Property::frozen(JsValue::Object(proto)));
        self.object_mut(proto)?
            .insert("constructor", Property::hidden(JsValue::Object(func)));
        self.set_builtin(name, JsValue::Object(func));
        self.global_set(name, JsValue::Object(func))?;
        Ok(func)
    }

    /// A plain namespace object (`Math`, `JSON`, ...) bound as a global
    pub(crate) fn create_namespace(&mut self, name: &str) -> Result<ObjectId, JsError> {
        let object = self.create_plain_object(Some(self.root_owner()))?;
        self.set_builtin(name, JsValue::Object(object));
        self.global_set(name, JsValue::Object(object))?;
        Ok(object)
    }
}
