//! JavaScript value representation
//!
//! The core JsValue type and the heap object layout. Objects live in the
//! interpreter's arena (see [`crate::gc::Heap`]) and are referred to by
//! [`ObjectId`]; values never hold pointers, which keeps every piece of
//! runtime state plain data that the snapshot encoder can walk.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::NodeRef;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit at the call site that a clone only bumps a reference
/// count. Plain `.clone()` still works everywhere.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// Insertion-ordered map keyed by property name
pub type PropertyMap<V> = IndexMap<JsString, V, FxBuildHasher>;

// ═══════════════════════════════════════════════════════════════════════════
// Arena handles
// ═══════════════════════════════════════════════════════════════════════════

/// Handle of an object slot in the heap arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Handle of a scope slot in the heap arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// The principal on whose behalf code runs. Owners are ordinary objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner(pub ObjectId);

// ═══════════════════════════════════════════════════════════════════════════
// JsValue
// ═══════════════════════════════════════════════════════════════════════════

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Object(ObjectId),
}

impl JsValue {
    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            JsValue::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            // NaN !== NaN, 0 === -0
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a == b,
            _ => false,
        }
    }

    /// SameValue: like `===` but NaN equals NaN and 0 differs from -0
    pub fn same_value(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Object(id) => write!(f, "[object #{}]", id.0),
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

// Conversions from Rust types

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<u32> for JsValue {
    fn from(n: u32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<ObjectId> for JsValue {
    fn from(id: ObjectId) -> Self {
        JsValue::Object(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// JsString
// ═══════════════════════════════════════════════════════════════════════════

/// Reference-counted immutable string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units, which is what `.length` reports
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// The canonical array index this string names, if any
    pub fn as_array_index(&self) -> Option<u32> {
        array_index(&self.0)
    }
}

/// Canonical array index: decimal without leading zeros, below 2^32 - 1
pub fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u64 = key.parse().ok()?;
    if index < u64::from(u32::MAX) {
        u32::try_from(index).ok()
    } else {
        None
    }
}

impl std::ops::Deref for JsString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for JsString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JsString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(JsString::from)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════════

/// A data property with its attribute flags
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Ordinary assignment-created property: all flags set
    pub fn data(value: JsValue) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Builtin method style: writable and configurable, not enumerable
    pub fn hidden(value: JsValue) -> Self {
        Self {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// No flags set
    pub fn frozen(value: JsValue) -> Self {
        Self {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    pub fn with_flags(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value,
            writable,
            enumerable,
            configurable,
        }
    }
}

/// Internal class tag of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Object,
    Array,
    Function,
    Error,
    Arguments,
}

impl ObjectClass {
    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::Object => "Object",
            ObjectClass::Array => "Array",
            ObjectClass::Function => "Function",
            ObjectClass::Error => "Error",
            ObjectClass::Arguments => "Arguments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Object" => Some(ObjectClass::Object),
            "Array" => Some(ObjectClass::Array),
            "Function" => Some(ObjectClass::Function),
            "Error" => Some(ObjectClass::Error),
            "Arguments" => Some(ObjectClass::Arguments),
            _ => None,
        }
    }
}

/// Callable behaviour attached to a function object
#[derive(Debug, Clone)]
pub enum JsFunction {
    /// A function literal closed over `scope`
    Interpreted { func: NodeRef, scope: ScopeId },
    /// Result of `Function.prototype.bind`
    Bound {
        target: ObjectId,
        this: JsValue,
        args: Vec<JsValue>,
    },
    /// Host function, looked up by id in the native registry
    Native { id: JsString },
}

/// A heap object
#[derive(Debug, Clone)]
pub struct JsObject {
    pub owner: Option<Owner>,
    pub prototype: Option<ObjectId>,
    pub extensible: bool,
    pub class: ObjectClass,
    pub properties: PropertyMap<Property>,
    pub function: Option<JsFunction>,
}

impl JsObject {
    pub fn new(class: ObjectClass, prototype: Option<ObjectId>, owner: Option<Owner>) -> Self {
        Self {
            owner,
            prototype,
            extensible: true,
            class,
            properties: PropertyMap::default(),
            function: None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.function.is_some()
    }

    pub fn is_array(&self) -> bool {
        self.class == ObjectClass::Array
    }

    pub fn get_own(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Value of an own data property, `undefined` when absent
    pub fn get_own_value(&self, key: &str) -> JsValue {
        self.properties
            .get(key)
            .map(|p| p.value.clone())
            .unwrap_or_default()
    }

    /// Insert or overwrite without any attribute or permission checks.
    /// Reserved for bootstrap and restore.
    pub fn insert(&mut self, key: impl Into<JsString>, prop: Property) {
        self.properties.insert(key.into(), prop);
    }

    /// Current `length` of an array-like object
    pub fn length(&self) -> u32 {
        match self.properties.get("length").map(|p| &p.value) {
            Some(JsValue::Number(n)) if *n >= 0.0 && *n <= f64::from(u32::MAX) => *n as u32,
            _ => 0,
        }
    }
}
