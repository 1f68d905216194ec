//! Object built-in methods

use crate::error::JsError;
use crate::interpreter::native::NativeCall;
use crate::interpreter::object::PropertyDescriptor;
use crate::interpreter::operators::to_js_string;
use crate::interpreter::permission::Access;
use crate::interpreter::Interpreter;
use crate::value::{JsValue, ObjectId, Owner, Property};

use super::{builtin, object_arg, this_object};

pub fn init_object(interp: &mut Interpreter) -> Result<(), JsError> {
    let proto = interp.builtin_object("Object.prototype")?;
    interp.register_method(proto, "Object.prototype", "hasOwnProperty", object_has_own_property, 1)?;
    interp.register_method(proto, "Object.prototype", "toString", object_to_string, 0)?;
    interp.register_method(proto, "Object.prototype", "valueOf", object_value_of, 0)?;

    let ctor = interp.register_constructor(
        "Object",
        builtin(object_constructor),
        Some(builtin(object_constructor)),
        1,
    )?;
    interp.register_method(ctor, "Object", "create", object_create, 2)?;
    interp.register_method(ctor, "Object", "getPrototypeOf", object_get_prototype_of, 1)?;
    interp.register_method(ctor, "Object", "setPrototypeOf", object_set_prototype_of, 2)?;
    interp.register_method(ctor, "Object", "defineProperty", object_define_property, 3)?;
    interp.register_method(
        ctor,
        "Object",
        "getOwnPropertyDescriptor",
        object_get_own_property_descriptor,
        2,
    )?;
    interp.register_method(ctor, "Object", "getOwnPropertyNames", object_get_own_property_names, 1)?;
    interp.register_method(ctor, "Object", "keys", object_keys, 1)?;
    interp.register_method(ctor, "Object", "preventExtensions", object_prevent_extensions, 1)?;
    interp.register_method(ctor, "Object", "isExtensible", object_is_extensible, 1)?;
    interp.register_method(ctor, "Object", "getOwnerOf", object_get_owner_of, 1)?;
    interp.register_method(ctor, "Object", "setOwnerOf", object_set_owner_of, 2)?;
    Ok(())
}

/// Property key from an argument; objects are not converted here
fn key_arg(call: &NativeCall, index: usize) -> crate::value::JsString {
    to_js_string(&call.arg(index))
}

fn proto_arg(call: &NativeCall, index: usize) -> Result<Option<ObjectId>, JsError> {
    match call.arg(index) {
        JsValue::Object(id) => Ok(Some(id)),
        JsValue::Null => Ok(None),
        _ => Err(JsError::type_error(
            "Object prototype may only be an Object or null",
        )),
    }
}

fn object_constructor(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    match call.arg(0) {
        JsValue::Object(id) => Ok(JsValue::Object(id)),
        _ => Ok(JsValue::Object(interp.create_plain_object(call.owner)?)),
    }
}

fn object_create(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let proto = proto_arg(call, 0)?;
    let object = interp.create_object(proto, call.owner);
    if let JsValue::Object(props) = call.arg(1) {
        for key in interp.own_keys(props, call.owner, false)? {
            let desc = interp.get(&JsValue::Object(props), &key, call.owner)?;
            let desc = to_descriptor(interp, &desc, call.owner)?;
            interp.define_property(object, &key, desc, call.owner)?;
        }
    }
    Ok(JsValue::Object(object))
}

fn object_get_prototype_of(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.getPrototypeOf")?;
    Ok(interp
        .get_prototype(object, call.owner)?
        .map(JsValue::Object)
        .unwrap_or(JsValue::Null))
}

fn object_set_prototype_of(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.setPrototypeOf")?;
    let proto = proto_arg(call, 1)?;
    interp.set_prototype(object, proto, call.owner)?;
    Ok(JsValue::Object(object))
}

/// ES5 8.10.5 ToPropertyDescriptor, for data descriptors
fn to_descriptor(
    interp: &Interpreter,
    value: &JsValue,
    actor: Option<Owner>,
) -> Result<PropertyDescriptor, JsError> {
    let Some(desc) = value.as_object() else {
        return Err(JsError::type_error("Property description must be an object"));
    };
    let field = |name: &str| -> Result<Option<JsValue>, JsError> {
        if interp.has_property(desc, name, actor)? {
            Ok(Some(interp.get(value, name, actor)?))
        } else {
            Ok(None)
        }
    };
    if field("get")?.is_some() || field("set")?.is_some() {
        return Err(JsError::type_error("Accessor properties are not supported"));
    }
    Ok(PropertyDescriptor {
        value: field("value")?,
        writable: field("writable")?.map(|v| v.to_boolean()),
        enumerable: field("enumerable")?.map(|v| v.to_boolean()),
        configurable: field("configurable")?.map(|v| v.to_boolean()),
    })
}

fn object_define_property(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.defineProperty")?;
    let key = key_arg(call, 1);
    let desc = to_descriptor(interp, &call.arg(2), call.owner)?;
    interp.define_property(object, &key, desc, call.owner)?;
    Ok(JsValue::Object(object))
}

fn object_get_own_property_descriptor(
    interp: &mut Interpreter,
    call: &mut NativeCall,
) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.getOwnPropertyDescriptor")?;
    let key = key_arg(call, 1);
    let Some(prop) = interp.get_own_property(object, &key, call.owner)? else {
        return Ok(JsValue::Undefined);
    };
    let desc = interp.create_plain_object(call.owner)?;
    let record = interp.object_mut(desc)?;
    record.insert("value", Property::data(prop.value));
    record.insert("writable", Property::data(JsValue::Boolean(prop.writable)));
    record.insert("enumerable", Property::data(JsValue::Boolean(prop.enumerable)));
    record.insert("configurable", Property::data(JsValue::Boolean(prop.configurable)));
    Ok(JsValue::Object(desc))
}

fn object_get_own_property_names(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.getOwnPropertyNames")?;
    let keys = interp.own_keys(object, call.owner, true)?;
    let keys = keys.into_iter().map(JsValue::String).collect();
    Ok(JsValue::Object(interp.create_array(keys, call.owner)?))
}

fn object_keys(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.keys")?;
    let keys = interp.own_keys(object, call.owner, false)?;
    let keys = keys.into_iter().map(JsValue::String).collect();
    Ok(JsValue::Object(interp.create_array(keys, call.owner)?))
}

fn object_prevent_extensions(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.preventExtensions")?;
    interp.prevent_extensions(object, call.owner)?;
    Ok(JsValue::Object(object))
}

fn object_is_extensible(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.isExtensible")?;
    interp.authorize(call.owner, object, Access::Read)?;
    Ok(JsValue::Boolean(interp.object(object)?.extensible))
}

fn object_get_owner_of(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.getOwnerOf")?;
    interp.authorize(call.owner, object, Access::Read)?;
    Ok(interp
        .object(object)?
        .owner
        .map(|owner| JsValue::Object(owner.0))
        .unwrap_or(JsValue::Null))
}

fn object_set_owner_of(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = object_arg(call, 0, "Object.setOwnerOf")?;
    let owner = object_arg(call, 1, "Object.setOwnerOf")?;
    interp.set_owner_of(object, Owner(owner), call.owner)?;
    Ok(JsValue::Object(object))
}

fn object_has_own_property(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let object = this_object(call, "Object.prototype.hasOwnProperty")?;
    let key = key_arg(call, 0);
    Ok(JsValue::Boolean(
        interp.get_own_property(object, &key, call.owner)?.is_some(),
    ))
}

fn object_to_string(interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    let tag = match &call.this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Object(id) => interp.object(*id)?.class.name(),
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

fn object_value_of(_interp: &mut Interpreter, call: &mut NativeCall) -> Result<JsValue, JsError> {
    Ok(call.this.clone())
}
