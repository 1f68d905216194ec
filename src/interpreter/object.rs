//! Object model operations
//!
//! Every operation names the acting Owner and is authorized before it touches
//! the object. Property lookups on primitives go through a transient,
//! read-only box: the primitive's prototype is consulted but no object is
//! allocated, and writes are refused.

use crate::error::JsError;
use crate::number::number_to_string;
use crate::value::{
    array_index, JsFunction, JsObject, JsString, JsValue, ObjectClass, ObjectId, Owner, Property,
};

use super::operators::{to_js_string, to_number};
use super::permission::{Access, AccessRequest};
use super::Interpreter;

/// Attribute changes requested by `defineProperty`; absent fields keep their
/// current value (or default to `false` on a new property)
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════════

    pub fn alloc(&mut self, object: JsObject) -> ObjectId {
        self.heap.alloc_object(object)
    }

    pub fn object(&self, id: ObjectId) -> Result<&JsObject, JsError> {
        self.heap.object(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut JsObject, JsError> {
        self.heap.object_mut(id)
    }

    pub fn create_object(&mut self, proto: Option<ObjectId>, owner: Option<Owner>) -> ObjectId {
        self.alloc(JsObject::new(ObjectClass::Object, proto, owner))
    }

    /// `{}` owned by `owner`
    pub fn create_plain_object(&mut self, owner: Option<Owner>) -> Result<ObjectId, JsError> {
        let proto = self.builtin_object("Object.prototype")?;
        Ok(self.create_object(Some(proto), owner))
    }

    pub fn create_array(
        &mut self,
        values: Vec<JsValue>,
        owner: Option<Owner>,
    ) -> Result<ObjectId, JsError> {
        let proto = self.builtin_object("Array.prototype")?;
        let mut array = JsObject::new(ObjectClass::Array, Some(proto), owner);
        let len = values.len() as u32;
        for (index, value) in values.into_iter().enumerate() {
            array.insert(index.to_string(), Property::data(value));
        }
        array.insert(
            "length",
            Property::with_flags(JsValue::from(len), true, false, false),
        );
        Ok(self.alloc(array))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Authorization
    // ═══════════════════════════════════════════════════════════════════════

    /// Authorize `access` by `actor` against an object with `object_owner`
    pub fn authorize_owner(
        &self,
        actor: Option<Owner>,
        object_owner: Option<Owner>,
        access: Access,
    ) -> Result<(), JsError> {
        let actor =
            actor.ok_or_else(|| JsError::permission_error("No owner for this operation"))?;
        let request = AccessRequest {
            actor,
            object_owner,
            access,
            root: self.root_owner,
        };
        if self.policy.allows(&request) {
            Ok(())
        } else {
            Err(JsError::permission_error(format!(
                "Permission denied: cannot {} object",
                access
            )))
        }
    }

    pub fn authorize(&self, actor: Option<Owner>, object: ObjectId, access: Access) -> Result<(), JsError> {
        let object_owner = self.heap.object(object)?.owner;
        self.authorize_owner(actor, object_owner, access)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════

    /// Prototype used when a primitive is boxed for property access
    fn primitive_prototype(&self, value: &JsValue) -> Result<Option<ObjectId>, JsError> {
        let key = match value {
            JsValue::String(_) => "String.prototype",
            JsValue::Number(_) => "Number.prototype",
            JsValue::Boolean(_) => "Boolean.prototype",
            _ => return Ok(None),
        };
        self.builtin_object(key).map(Some)
    }

    /// Find a property along the prototype chain, without authorization
    pub fn lookup(&self, object: ObjectId, key: &str) -> Result<Option<Property>, JsError> {
        let mut current = Some(object);
        while let Some(id) = current {
            let record = self.heap.object(id)?;
            if let Some(prop) = record.properties.get(key) {
                return Ok(Some(prop.clone()));
            }
            current = record.prototype;
        }
        Ok(None)
    }

    /// `base[key]`
    pub fn get(&self, base: &JsValue, key: &str, actor: Option<Owner>) -> Result<JsValue, JsError> {
        match base {
            JsValue::Object(id) => {
                self.authorize(actor, *id, Access::Read)?;
                Ok(self
                    .lookup(*id, key)?
                    .map(|p| p.value)
                    .unwrap_or_default())
            }
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot read property '{}' of {}",
                key,
                to_js_string(base)
            ))),
            JsValue::String(s) => {
                if key == "length" {
                    return Ok(JsValue::from(s.utf16_len() as u32));
                }
                if let Some(index) = array_index(key) {
                    if let Some(unit) = s.as_str().encode_utf16().nth(index as usize) {
                        return Ok(JsValue::from(String::from_utf16_lossy(&[unit])));
                    }
                }
                self.get_from_box(base, key, actor)
            }
            _ => self.get_from_box(base, key, actor),
        }
    }

    fn get_from_box(&self, base: &JsValue, key: &str, actor: Option<Owner>) -> Result<JsValue, JsError> {
        match self.primitive_prototype(base)? {
            Some(proto) => self.get(&JsValue::Object(proto), key, actor),
            None => Ok(JsValue::Undefined),
        }
    }

    pub fn get_own_property(
        &self,
        object: ObjectId,
        key: &str,
        actor: Option<Owner>,
    ) -> Result<Option<Property>, JsError> {
        self.authorize(actor, object, Access::Read)?;
        Ok(self.heap.object(object)?.properties.get(key).cloned())
    }

    /// The `in` operator
    pub fn has_property(&self, object: ObjectId, key: &str, actor: Option<Owner>) -> Result<bool, JsError> {
        self.authorize(actor, object, Access::Read)?;
        Ok(self.lookup(object, key)?.is_some())
    }

    pub fn get_prototype(&self, object: ObjectId, actor: Option<Owner>) -> Result<Option<ObjectId>, JsError> {
        self.authorize(actor, object, Access::Read)?;
        Ok(self.heap.object(object)?.prototype)
    }

    /// Own property names in enumeration order: array indices ascending,
    /// then the rest in insertion order
    pub fn own_keys(
        &self,
        object: ObjectId,
        actor: Option<Owner>,
        include_hidden: bool,
    ) -> Result<Vec<JsString>, JsError> {
        self.authorize(actor, object, Access::Enumerate)?;
        let record = self.heap.object(object)?;
        let mut indices = Vec::new();
        let mut names = Vec::new();
        for (key, prop) in &record.properties {
            if !include_hidden && !prop.enumerable {
                continue;
            }
            match key.as_array_index() {
                Some(index) => indices.push((index, key.clone())),
                None => names.push(key.clone()),
            }
        }
        indices.sort_by_key(|(index, _)| *index);
        Ok(indices.into_iter().map(|(_, key)| key).chain(names).collect())
    }

    /// Keys visited by `for-in`: enumerable names along the prototype chain,
    /// each reported once
    pub fn for_in_keys(&self, value: &JsValue, actor: Option<Owner>) -> Result<Vec<JsString>, JsError> {
        let mut keys: Vec<JsString> = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        let mut current = match value {
            JsValue::Object(id) => Some(*id),
            JsValue::String(s) => {
                for index in 0..s.utf16_len() {
                    let key = JsString::from(index.to_string());
                    seen.insert(key.clone());
                    keys.push(key);
                }
                self.primitive_prototype(value)?
            }
            _ => self.primitive_prototype(value)?,
        };
        while let Some(id) = current {
            for key in self.own_keys(id, actor, true)? {
                if seen.insert(key.clone()) {
                    let enumerable = self
                        .heap
                        .object(id)?
                        .properties
                        .get(key.as_str())
                        .is_some_and(|p| p.enumerable);
                    if enumerable {
                        keys.push(key);
                    }
                }
            }
            current = self.heap.object(id)?.prototype;
        }
        Ok(keys)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════════

    /// `base[key] = value` with strict-mode failure semantics
    pub fn put(
        &mut self,
        base: &JsValue,
        key: &str,
        value: JsValue,
        actor: Option<Owner>,
    ) -> Result<(), JsError> {
        let id = match base {
            JsValue::Object(id) => *id,
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot set property '{}' of {}",
                    key,
                    to_js_string(base)
                )));
            }
            _ => {
                return Err(JsError::type_error(format!(
                    "Cannot assign to property '{}' of primitive value",
                    key
                )));
            }
        };
        self.authorize(actor, id, Access::Write)?;

        let record = self.heap.object(id)?;
        if let Some(own) = record.properties.get(key) {
            if !own.writable {
                return Err(read_only(key));
            }
            if record.is_array() && key == "length" {
                return self.set_array_length(id, &value);
            }
            if let Some(prop) = self.heap.object_mut(id)?.properties.get_mut(key) {
                prop.value = value;
            }
            return Ok(());
        }

        if let Some(proto) = record.prototype {
            if let Some(inherited) = self.lookup(proto, key)? {
                if !inherited.writable {
                    return Err(read_only(key));
                }
            }
        }
        let record = self.heap.object(id)?;
        if !record.extensible {
            return Err(JsError::type_error(format!(
                "Cannot add property {}, object is not extensible",
                key
            )));
        }
        let grows_array = record.is_array()
            && array_index(key).is_some_and(|index| index >= record.length());

        let record = self.heap.object_mut(id)?;
        record.insert(key, Property::data(value));
        if grows_array {
            if let Some(index) = array_index(key) {
                record.insert(
                    "length",
                    Property::with_flags(JsValue::from(f64::from(index) + 1.0), true, false, false),
                );
            }
        }
        Ok(())
    }

    fn set_array_length(&mut self, id: ObjectId, value: &JsValue) -> Result<(), JsError> {
        let requested = match value {
            JsValue::Number(n) => *n,
            _ => to_number(value),
        };
        let new_len = requested as u32;
        if f64::from(new_len) != requested {
            return Err(JsError::range_error("Invalid array length"));
        }
        let record = self.heap.object_mut(id)?;
        let old_len = record.length();
        if new_len < old_len {
            record
                .properties
                .retain(|key, _| key.as_array_index().is_none_or(|index| index < new_len));
        }
        if let Some(prop) = record.properties.get_mut("length") {
            prop.value = JsValue::from(new_len);
        }
        Ok(())
    }

    /// `Object.defineProperty` with ES5 redefinition rules
    pub fn define_property(
        &mut self,
        object: ObjectId,
        key: &str,
        desc: PropertyDescriptor,
        actor: Option<Owner>,
    ) -> Result<(), JsError> {
        self.authorize(actor, object, Access::Define)?;
        let record = self.heap.object(object)?;
        let is_array_length = record.is_array() && key == "length";
        let merged = match record.properties.get(key) {
            None => {
                if !record.extensible {
                    return Err(JsError::type_error(format!(
                        "Cannot define property {}, object is not extensible",
                        key
                    )));
                }
                Property::with_flags(
                    desc.value.clone().unwrap_or_default(),
                    desc.writable.unwrap_or(false),
                    desc.enumerable.unwrap_or(false),
                    desc.configurable.unwrap_or(false),
                )
            }
            Some(current) => {
                if !current.configurable {
                    let changes_flags = desc.configurable == Some(true)
                        || desc.enumerable.is_some_and(|e| e != current.enumerable)
                        || (!current.writable && desc.writable == Some(true));
                    let changes_value = !current.writable
                        && desc.value.as_ref().is_some_and(|v| !v.same_value(&current.value));
                    if changes_flags || changes_value {
                        return Err(JsError::type_error(format!("Cannot redefine property: {}", key)));
                    }
                }
                Property::with_flags(
                    desc.value.clone().unwrap_or_else(|| current.value.clone()),
                    desc.writable.unwrap_or(current.writable),
                    desc.enumerable.unwrap_or(current.enumerable),
                    desc.configurable.unwrap_or(current.configurable),
                )
            }
        };

        if is_array_length {
            if let Some(value) = &desc.value {
                self.set_array_length(object, value)?;
            }
            if let Some(prop) = self.heap.object_mut(object)?.properties.get_mut("length") {
                prop.writable = merged.writable;
            }
            return Ok(());
        }

        let record = self.heap.object_mut(object)?;
        let grows_array = record.is_array()
            && array_index(key).is_some_and(|index| index >= record.length());
        record.insert(key, merged);
        if grows_array {
            if let Some(index) = array_index(key) {
                if let Some(prop) = record.properties.get_mut("length") {
                    prop.value = JsValue::from(f64::from(index) + 1.0);
                }
            }
        }
        Ok(())
    }

    /// Define or overwrite a builtin-style property, skipping redefinition
    /// rules but not authorization
    pub fn define_hidden(
        &mut self,
        object: ObjectId,
        key: &str,
        value: JsValue,
        actor: Option<Owner>,
    ) -> Result<(), JsError> {
        self.authorize(actor, object, Access::Define)?;
        self.heap
            .object_mut(object)?
            .insert(key, Property::hidden(value));
        Ok(())
    }

    /// The `delete` operator. Non-configurable properties are a TypeError
    /// (strict mode).
    pub fn delete_property(&mut self, object: ObjectId, key: &str, actor: Option<Owner>) -> Result<bool, JsError> {
        self.authorize(actor, object, Access::Delete)?;
        let record = self.heap.object_mut(object)?;
        match record.properties.get(key) {
            None => Ok(true),
            Some(prop) if !prop.configurable => Err(JsError::type_error(format!(
                "Cannot delete property '{}'",
                key
            ))),
            Some(_) => {
                record.properties.shift_remove(key);
                Ok(true)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Structure
    // ═══════════════════════════════════════════════════════════════════════

    /// Reparent `object`. A missing Owner and prototype cycles are always
    /// rejected.
    pub fn set_prototype(
        &mut self,
        object: ObjectId,
        proto: Option<ObjectId>,
        actor: Option<Owner>,
    ) -> Result<(), JsError> {
        if actor.is_none() {
            return Err(JsError::permission_error("No owner for this operation"));
        }
        let mut current = proto;
        while let Some(id) = current {
            if id == object {
                return Err(JsError::type_error("Cyclic __proto__ value"));
            }
            current = self.heap.object(id)?.prototype;
        }
        self.authorize(actor, object, Access::SetPrototype)?;
        let record = self.heap.object_mut(object)?;
        if record.prototype == proto {
            return Ok(());
        }
        if !record.extensible {
            return Err(JsError::type_error("Cannot set prototype of a non-extensible object"));
        }
        record.prototype = proto;
        Ok(())
    }

    pub fn prevent_extensions(&mut self, object: ObjectId, actor: Option<Owner>) -> Result<(), JsError> {
        self.authorize(actor, object, Access::PreventExtensions)?;
        self.heap.object_mut(object)?.extensible = false;
        Ok(())
    }

    pub fn set_owner_of(
        &mut self,
        object: ObjectId,
        owner: Owner,
        actor: Option<Owner>,
    ) -> Result<(), JsError> {
        self.authorize(actor, object, Access::SetOwner)?;
        self.heap.object_mut(object)?.owner = Some(owner);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_callable(&self, value: &JsValue) -> bool {
        match value {
            JsValue::Object(id) => self.heap.object(*id).is_ok_and(JsObject::is_callable),
            _ => false,
        }
    }

    pub fn function_of(&self, id: ObjectId) -> Result<Option<JsFunction>, JsError> {
        Ok(self.heap.object(id)?.function.clone())
    }

    /// `value instanceof func`
    pub fn instance_of(&self, value: &JsValue, func: &JsValue, actor: Option<Owner>) -> Result<bool, JsError> {
        let Some(mut func_id) = func.as_object().filter(|_| self.is_callable(func)) else {
            return Err(JsError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        };
        while let Some(JsFunction::Bound { target, .. }) = self.function_of(func_id)? {
            func_id = target;
        }
        let Some(mut current) = value.as_object() else {
            return Ok(false);
        };
        let proto = self.get(&JsValue::Object(func_id), "prototype", actor)?;
        let Some(proto) = proto.as_object() else {
            return Err(JsError::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        loop {
            match self.heap.object(current)?.prototype {
                Some(p) if p == proto => return Ok(true),
                Some(p) => current = p,
                None => return Ok(false),
            }
        }
    }

    pub fn type_of(&self, value: &JsValue) -> &'static str {
        match value {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(_) if self.is_callable(value) => "function",
            JsValue::Object(_) => "object",
        }
    }

    /// Name reported for an object in messages: its class, or `name` for
    /// functions
    pub fn describe(&self, value: &JsValue) -> String {
        match value {
            JsValue::Object(id) => match self.heap.object(*id) {
                Ok(record) if record.is_callable() => match record.get_own_value("name") {
                    JsValue::String(name) if !name.is_empty() => format!("function {}", name),
                    _ => "function".to_string(),
                },
                Ok(record) => format!("[object {}]", record.class.name()),
                Err(_) => "[object]".to_string(),
            },
            JsValue::Number(n) => number_to_string(*n),
            other => to_js_string(other).to_string(),
        }
    }
}

fn read_only(key: &str) -> JsError {
    JsError::type_error(format!(
        "Cannot assign to read only property '{}' of object",
        key
    ))
}
