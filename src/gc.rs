//! Arena heap and mark-and-sweep garbage collection.
//!
//! Objects, scopes and loaded programs live in three slot arenas and are
//! addressed by plain integer handles. Nothing in the runtime holds a pointer
//! into the heap, so the whole object graph is ordinary data: the snapshot
//! encoder walks it by index and a collection never invalidates a handle that
//! is still reachable.
//!
//! Collection is mark-and-sweep. The interpreter decides what the roots are and
//! marks them through a [`Marker`]; everything reachable from them via
//! [`Traceable`] edges survives, every other slot is freed and its index is
//! reused by later allocations. Collections only ever run between steps.
//!
//! Handles the host keeps outside the heap are not reachable from any
//! interpreter root. The host pins them with a [`Guard`] for as long as it
//! needs them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::ast::{NodeRef, Program, ProgramId};
use crate::error::JsError;
use crate::interpreter::scope::Scope;
use crate::value::{JsFunction, JsObject, JsValue, ObjectId, Owner, ScopeId};

// ============================================================================
// Tracing
// ============================================================================

/// Types that hold heap handles.
///
/// Implementations call the marker for every handle stored in their fields.
/// The marker takes care of visiting each slot only once.
pub trait Traceable {
    fn trace(&self, marker: &mut Marker);
}

/// Mark state for one collection: a bitmap per arena plus a work list
pub struct Marker {
    objects: Vec<bool>,
    scopes: Vec<bool>,
    programs: Vec<bool>,
    pending_objects: Vec<ObjectId>,
    pending_scopes: Vec<ScopeId>,
}

impl Marker {
    fn new(heap: &Heap) -> Self {
        Self {
            objects: vec![false; heap.objects.len()],
            scopes: vec![false; heap.scopes.len()],
            programs: vec![false; heap.programs.len()],
            pending_objects: Vec::new(),
            pending_scopes: Vec::new(),
        }
    }

    pub fn object(&mut self, id: ObjectId) {
        if let Some(seen) = self.objects.get_mut(id.0 as usize) {
            if !*seen {
                *seen = true;
                self.pending_objects.push(id);
            }
        }
    }

    pub fn scope(&mut self, id: ScopeId) {
        if let Some(seen) = self.scopes.get_mut(id.0 as usize) {
            if !*seen {
                *seen = true;
                self.pending_scopes.push(id);
            }
        }
    }

    pub fn program(&mut self, id: ProgramId) {
        if let Some(seen) = self.programs.get_mut(id.0 as usize) {
            *seen = true;
        }
    }

    pub fn owner(&mut self, owner: Option<Owner>) {
        if let Some(Owner(id)) = owner {
            self.object(id);
        }
    }

    pub fn value(&mut self, value: &JsValue) {
        if let JsValue::Object(id) = value {
            self.object(*id);
        }
    }

    pub fn values<'a>(&mut self, values: impl IntoIterator<Item = &'a JsValue>) {
        for value in values {
            self.value(value);
        }
    }

    pub fn node(&mut self, node: NodeRef) {
        self.program(node.program);
    }
}

impl Traceable for JsValue {
    fn trace(&self, marker: &mut Marker) {
        marker.value(self);
    }
}

impl Traceable for JsFunction {
    fn trace(&self, marker: &mut Marker) {
        match self {
            JsFunction::Interpreted { func, scope } => {
                marker.node(*func);
                marker.scope(*scope);
            }
            JsFunction::Bound { target, this, args } => {
                marker.object(*target);
                marker.value(this);
                marker.values(args);
            }
            JsFunction::Native { .. } => {}
        }
    }
}

impl Traceable for JsObject {
    fn trace(&self, marker: &mut Marker) {
        marker.owner(self.owner);
        if let Some(proto) = self.prototype {
            marker.object(proto);
        }
        for prop in self.properties.values() {
            marker.value(&prop.value);
        }
        if let Some(func) = &self.function {
            func.trace(marker);
        }
    }
}

// ============================================================================
// Heap
// ============================================================================

/// GC statistics for debugging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcStats {
    pub live_objects: usize,
    pub live_scopes: usize,
    pub live_programs: usize,
    pub free_slots: usize,
    pub allocs_since_gc: usize,
    pub gc_threshold: usize,
}

/// The three arenas plus allocation bookkeeping
pub struct Heap {
    objects: Vec<Option<JsObject>>,
    scopes: Vec<Option<Scope>>,
    programs: Vec<Option<Rc<Program>>>,
    free_objects: Vec<u32>,
    free_scopes: Vec<u32>,
    allocs_since_gc: usize,
    gc_threshold: usize,
    /// Pin counts of every object held by a live [`Guard`]
    guarded: Rc<RefCell<FxHashMap<ObjectId, usize>>>,
}

impl Heap {
    pub fn new(gc_threshold: usize) -> Self {
        Self {
            objects: Vec::new(),
            scopes: Vec::new(),
            programs: Vec::new(),
            free_objects: Vec::new(),
            free_scopes: Vec::new(),
            allocs_since_gc: 0,
            gc_threshold,
            guarded: Rc::default(),
        }
    }

    /// A new, empty root anchor for host-held handles
    pub fn create_guard(&self) -> Guard {
        Guard {
            roots: Rc::downgrade(&self.guarded),
            guarded: RefCell::new(Vec::new()),
        }
    }

    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold;
    }

    /// Whether enough allocations happened to warrant a collection
    pub fn should_collect(&self) -> bool {
        self.gc_threshold > 0 && self.allocs_since_gc >= self.gc_threshold
    }

    pub fn alloc_object(&mut self, object: JsObject) -> ObjectId {
        self.allocs_since_gc += 1;
        if let Some(index) = self.free_objects.pop() {
            if let Some(slot) = self.objects.get_mut(index as usize) {
                *slot = Some(object);
                return ObjectId(index);
            }
        }
        self.objects.push(Some(object));
        ObjectId((self.objects.len() - 1) as u32)
    }

    pub fn alloc_scope(&mut self, scope: Scope) -> ScopeId {
        self.allocs_since_gc += 1;
        if let Some(index) = self.free_scopes.pop() {
            if let Some(slot) = self.scopes.get_mut(index as usize) {
                *slot = Some(scope);
                return ScopeId(index);
            }
        }
        self.scopes.push(Some(scope));
        ScopeId((self.scopes.len() - 1) as u32)
    }

    /// Programs are few and large; their slots are never reused
    pub fn add_program(&mut self, program: Rc<Program>) -> ProgramId {
        self.programs.push(Some(program));
        ProgramId((self.programs.len() - 1) as u32)
    }

    pub fn object(&self, id: ObjectId) -> Result<&JsObject, JsError> {
        self.objects
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| JsError::host_fault(format!("dangling object #{}", id.0)))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut JsObject, JsError> {
        self.objects
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| JsError::host_fault(format!("dangling object #{}", id.0)))
    }

    pub fn scope(&self, id: ScopeId) -> Result<&Scope, JsError> {
        self.scopes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| JsError::host_fault(format!("dangling scope #{}", id.0)))
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope, JsError> {
        self.scopes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| JsError::host_fault(format!("dangling scope #{}", id.0)))
    }

    pub fn program(&self, id: ProgramId) -> Result<Rc<Program>, JsError> {
        self.programs
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| JsError::host_fault(format!("dangling program #{}", id.0)))
    }

    pub fn stats(&self) -> GcStats {
        GcStats {
            live_objects: self.objects.iter().filter(|s| s.is_some()).count(),
            live_scopes: self.scopes.iter().filter(|s| s.is_some()).count(),
            live_programs: self.programs.iter().filter(|s| s.is_some()).count(),
            free_slots: self.free_objects.len() + self.free_scopes.len(),
            allocs_since_gc: self.allocs_since_gc,
            gc_threshold: self.gc_threshold,
        }
    }

    /// Mark from the roots supplied by `mark_roots`, then free everything
    /// unmarked. Returns the number of freed object and scope slots.
    pub fn collect(&mut self, mark_roots: impl FnOnce(&mut Marker)) -> usize {
        let mut marker = Marker::new(self);
        mark_roots(&mut marker);
        for id in self.guarded.borrow().keys() {
            marker.object(*id);
        }

        loop {
            if let Some(id) = marker.pending_objects.pop() {
                if let Some(Some(object)) = self.objects.get(id.0 as usize) {
                    object.trace(&mut marker);
                }
            } else if let Some(id) = marker.pending_scopes.pop() {
                if let Some(Some(scope)) = self.scopes.get(id.0 as usize) {
                    scope.trace(&mut marker);
                }
            } else {
                break;
            }
        }

        let mut freed = 0;
        for (index, (slot, marked)) in self.objects.iter_mut().zip(&marker.objects).enumerate() {
            if slot.is_some() && !*marked {
                *slot = None;
                self.free_objects.push(index as u32);
                freed += 1;
            }
        }
        for (index, (slot, marked)) in self.scopes.iter_mut().zip(&marker.scopes).enumerate() {
            if slot.is_some() && !*marked {
                *slot = None;
                self.free_scopes.push(index as u32);
                freed += 1;
            }
        }
        for (slot, marked) in self.programs.iter_mut().zip(&marker.programs) {
            if !*marked {
                *slot = None;
            }
        }

        self.allocs_since_gc = 0;
        freed
    }

    /// Ids of all live objects, in index order
    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| ObjectId(index as u32))
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(0)
    }
}

// ============================================================================
// Guard - root anchor for host-held handles
// ============================================================================

/// A root anchor that keeps objects alive.
///
/// Objects added to a guard survive collections until they are unguarded, the
/// guard is cleared, or the guard is dropped. A guard belongs to the heap it
/// was created from; once that heap is replaced (a snapshot restore) the guard
/// no longer pins anything.
pub struct Guard {
    roots: Weak<RefCell<FxHashMap<ObjectId, usize>>>,
    guarded: RefCell<Vec<ObjectId>>,
}

impl Guard {
    /// Keep `value` alive if it is an object. Returns whether it was pinned.
    pub fn guard(&self, value: &JsValue) -> bool {
        let (JsValue::Object(id), Some(roots)) = (value, self.roots.upgrade()) else {
            return false;
        };
        *roots.borrow_mut().entry(*id).or_insert(0) += 1;
        self.guarded.borrow_mut().push(*id);
        true
    }

    /// Release one pin of `value`. Returns true if it was guarded here.
    pub fn unguard(&self, value: &JsValue) -> bool {
        let JsValue::Object(id) = value else {
            return false;
        };
        let mut guarded = self.guarded.borrow_mut();
        let Some(pos) = guarded.iter().position(|g| g == id) else {
            return false;
        };
        guarded.swap_remove(pos);
        if let Some(roots) = self.roots.upgrade() {
            release(&mut roots.borrow_mut(), *id);
        }
        true
    }

    /// Release every pin held by this guard
    pub fn clear(&self) {
        let ids = std::mem::take(&mut *self.guarded.borrow_mut());
        if let Some(roots) = self.roots.upgrade() {
            let mut roots = roots.borrow_mut();
            for id in ids {
                release(&mut roots, id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.guarded.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guarded.borrow().is_empty()
    }
}

fn release(roots: &mut FxHashMap<ObjectId, usize>, id: ObjectId) {
    if let Some(count) = roots.get_mut(&id) {
        *count -= 1;
        if *count == 0 {
            roots.remove(&id);
        }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        self.clear();
    }
}
