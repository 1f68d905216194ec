//! Authorization of object operations
//!
//! Every object operation names the Owner acting on the object. The
//! interpreter rejects a missing Owner itself; everything beyond that is
//! decided by the configured [`AuthorizationPolicy`].

use std::fmt;

use crate::config::PolicyKind;
use crate::value::Owner;

/// The kind of operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Define,
    Delete,
    Enumerate,
    SetPrototype,
    PreventExtensions,
    SetOwner,
    /// Switch the acting Owner of a scope to another Owner
    Become,
}

impl Access {
    /// Whether the operation changes the object
    pub fn is_mutation(self) -> bool {
        !matches!(self, Access::Read | Access::Enumerate)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::Define => "define property on",
            Access::Delete => "delete property of",
            Access::Enumerate => "enumerate",
            Access::SetPrototype => "set prototype of",
            Access::PreventExtensions => "prevent extensions of",
            Access::SetOwner => "change owner of",
            Access::Become => "become",
        };
        f.write_str(name)
    }
}

/// One authorization question
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest {
    pub actor: Owner,
    /// Owner of the object being operated on; for `Become`, the Owner
    /// requested
    pub object_owner: Option<Owner>,
    pub access: Access,
    /// The interpreter's root owner
    pub root: Owner,
}

pub trait AuthorizationPolicy {
    fn name(&self) -> &'static str;

    fn allows(&self, request: &AccessRequest) -> bool;
}

/// Allows everything a non-null Owner asks for
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenPolicy;

impl AuthorizationPolicy for OpenPolicy {
    fn name(&self) -> &'static str {
        "open"
    }

    fn allows(&self, _request: &AccessRequest) -> bool {
        true
    }
}

/// Reads are open; mutation is reserved to the object's owner and the root
/// owner. Ownerless objects can only be changed by the root owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnerPolicy;

impl AuthorizationPolicy for OwnerPolicy {
    fn name(&self) -> &'static str {
        "owner"
    }

    fn allows(&self, request: &AccessRequest) -> bool {
        if request.actor == request.root {
            return true;
        }
        if !request.access.is_mutation() {
            return true;
        }
        request.object_owner == Some(request.actor)
    }
}

pub fn policy_for(kind: PolicyKind) -> Box<dyn AuthorizationPolicy> {
    match kind {
        PolicyKind::Open => Box::new(OpenPolicy),
        PolicyKind::Owner => Box::new(OwnerPolicy),
    }
}
