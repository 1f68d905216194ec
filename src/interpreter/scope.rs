//! Lexical environments
//!
//! A scope is a binding table plus the Owner that code running in it acts
//! as. Scopes form a chain through `outer` that ends at the global scope.

use crate::error::JsError;
use crate::gc::{Marker, Traceable};
use crate::value::{JsString, JsValue, Owner, PropertyMap, ScopeId};

use super::Interpreter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    /// Holds the self-binding of a named function expression
    FunctionExpressionName,
    Eval,
    Catch,
    /// Carries an owner and `this` but no bindings of its own; declarations
    /// land in the nearest enclosing scope that has bindings
    Dummy,
}

impl ScopeKind {
    pub fn name(self) -> &'static str {
        match self {
            ScopeKind::Global => "Global",
            ScopeKind::Function => "Function",
            ScopeKind::FunctionExpressionName => "FunctionExpressionName",
            ScopeKind::Eval => "Eval",
            ScopeKind::Catch => "Catch",
            ScopeKind::Dummy => "Dummy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Global" => ScopeKind::Global,
            "Function" => ScopeKind::Function,
            "FunctionExpressionName" => ScopeKind::FunctionExpressionName,
            "Eval" => ScopeKind::Eval,
            "Catch" => ScopeKind::Catch,
            "Dummy" => ScopeKind::Dummy,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub owner: Option<Owner>,
    pub outer: Option<ScopeId>,
    pub this_value: JsValue,
    pub bindings: PropertyMap<Binding>,
}

impl Scope {
    pub fn new(
        kind: ScopeKind,
        owner: Option<Owner>,
        outer: Option<ScopeId>,
        this_value: JsValue,
    ) -> Self {
        Self {
            kind,
            owner,
            outer,
            this_value,
            bindings: PropertyMap::default(),
        }
    }

    /// Raw insert, used by bootstrap and restore
    pub fn declare(&mut self, name: impl Into<JsString>, value: JsValue, mutable: bool) {
        self.bindings
            .insert(name.into(), Binding { value, mutable });
    }
}

impl Traceable for Scope {
    fn trace(&self, marker: &mut Marker) {
        marker.owner(self.owner);
        if let Some(outer) = self.outer {
            marker.scope(outer);
        }
        marker.value(&self.this_value);
        for binding in self.bindings.values() {
            marker.value(&binding.value);
        }
    }
}

impl Interpreter {
    /// Allocate a scope. `this` is inherited from `outer` unless given.
    pub fn new_scope(
        &mut self,
        kind: ScopeKind,
        outer: Option<ScopeId>,
        owner: Option<Owner>,
        this_value: Option<JsValue>,
    ) -> Result<ScopeId, JsError> {
        let this_value = match (this_value, outer) {
            (Some(this), _) => this,
            (None, Some(outer)) => self.heap.scope(outer)?.this_value.clone(),
            (None, None) => JsValue::Undefined,
        };
        Ok(self
            .heap
            .alloc_scope(Scope::new(kind, owner, outer, this_value)))
    }

    /// The nearest scope in the chain that binds `name`
    pub fn resolve_binding(&self, scope: ScopeId, name: &str) -> Result<Option<ScopeId>, JsError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let record = self.heap.scope(id)?;
            if record.bindings.contains_key(name) {
                return Ok(Some(id));
            }
            current = record.outer;
        }
        Ok(None)
    }

    pub fn get_binding(&self, scope: ScopeId, name: &str) -> Result<JsValue, JsError> {
        match self.resolve_binding(scope, name)? {
            Some(found) => self.read_binding(found, name),
            None => Err(JsError::reference_error(name)),
        }
    }

    /// Read a binding from the exact scope that holds it
    pub fn read_binding(&self, scope: ScopeId, name: &str) -> Result<JsValue, JsError> {
        self.heap
            .scope(scope)?
            .bindings
            .get(name)
            .map(|b| b.value.clone())
            .ok_or_else(|| JsError::reference_error(name))
    }

    /// Assign to an existing binding. Unresolvable names are a ReferenceError
    /// (strict mode), immutable bindings a TypeError.
    pub fn set_binding(&mut self, scope: ScopeId, name: &str, value: JsValue) -> Result<(), JsError> {
        let found = self
            .resolve_binding(scope, name)?
            .ok_or_else(|| JsError::reference_error(name))?;
        self.write_binding(found, name, value)
    }

    pub fn write_binding(&mut self, scope: ScopeId, name: &str, value: JsValue) -> Result<(), JsError> {
        let binding = self
            .heap
            .scope_mut(scope)?
            .bindings
            .get_mut(name)
            .ok_or_else(|| JsError::reference_error(name))?;
        if !binding.mutable {
            return Err(JsError::type_error(format!(
                "Assignment to constant variable '{}'",
                name
            )));
        }
        binding.value = value;
        Ok(())
    }

    /// The scope that receives declarations made in `scope`
    fn declaration_target(&self, scope: ScopeId) -> Result<ScopeId, JsError> {
        let mut current = scope;
        loop {
            let record = self.heap.scope(current)?;
            match (record.kind, record.outer) {
                (ScopeKind::Dummy, Some(outer)) => current = outer,
                _ => return Ok(current),
            }
        }
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: JsValue,
        mutable: bool,
    ) -> Result<(), JsError> {
        let target = self.declaration_target(scope)?;
        let record = self.heap.scope_mut(target)?;
        if record.bindings.contains_key(name) {
            return Err(JsError::host_fault(format!(
                "'{}' is already declared in this scope",
                name
            )));
        }
        record.declare(name, value, mutable);
        Ok(())
    }

    pub fn declare_mutable(&mut self, scope: ScopeId, name: &str, value: JsValue) -> Result<(), JsError> {
        self.declare(scope, name, value, true)
    }

    pub fn declare_immutable(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: JsValue,
    ) -> Result<(), JsError> {
        self.declare(scope, name, value, false)
    }

    /// Whether `scope` itself (after Dummy forwarding) binds `name`
    pub fn binds_locally(&self, scope: ScopeId, name: &str) -> Result<bool, JsError> {
        let target = self.declaration_target(scope)?;
        Ok(self.heap.scope(target)?.bindings.contains_key(name))
    }

    pub fn scope_owner(&self, scope: ScopeId) -> Result<Option<Owner>, JsError> {
        Ok(self.heap.scope(scope)?.owner)
    }

    pub fn set_scope_owner(&mut self, scope: ScopeId, owner: Owner) -> Result<(), JsError> {
        self.heap.scope_mut(scope)?.owner = Some(owner);
        Ok(())
    }

    pub fn scope_this(&self, scope: ScopeId) -> Result<JsValue, JsError> {
        Ok(self.heap.scope(scope)?.this_value.clone())
    }
}
