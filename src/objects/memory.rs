use super::{ObjectSource, SourceObject};
use crate::core::ObjectRef;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory object tree, mainly for tests and embedded hosts.
///
/// Backed by a `BTreeMap` keyed by reference so iteration order is
/// already the stable ascending order the `ObjectSource` contract asks for.
#[derive(Debug, Default)]
pub struct MemoryTree {
    objects: RwLock<BTreeMap<ObjectRef, SourceObject>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object, returning its reference.
    pub fn insert(&self, object: SourceObject) -> ObjectRef {
        let object_ref = object.id;
        self.objects
            .write()
            .expect("object tree lock poisoned")
            .insert(object_ref, object);
        object_ref
    }

    pub fn update_field(
        &self,
        object_ref: &ObjectRef,
        name: impl Into<String>,
        value: crate::core::Value,
    ) -> bool {
        let mut objects = self.objects.write().expect("object tree lock poisoned");
        match objects.get_mut(object_ref) {
            Some(object) => {
                object.fields.insert(name.into(), value);
                true
            }
            None => false,
        }
    }

    pub fn set_role_assignments(
        &self,
        object_ref: &ObjectRef,
        assignments: Vec<super::RoleAssignment>,
        inherits_security: bool,
    ) -> bool {
        let mut objects = self.objects.write().expect("object tree lock poisoned");
        match objects.get_mut(object_ref) {
            Some(object) => {
                object.role_assignments = assignments;
                object.inherits_security = inherits_security;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, object_ref: &ObjectRef) -> Option<SourceObject> {
        self.objects
            .write()
            .expect("object tree lock poisoned")
            .remove(object_ref)
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("object tree lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectSource for MemoryTree {
    fn get(&self, object_ref: &ObjectRef) -> Option<SourceObject> {
        self.objects
            .read()
            .expect("object tree lock poisoned")
            .get(object_ref)
            .cloned()
    }

    fn children(&self, parent: &ObjectRef) -> Vec<ObjectRef> {
        self.objects
            .read()
            .expect("object tree lock poisoned")
            .values()
            .filter(|object| object.parent.as_ref() == Some(parent))
            .map(|object| object.id)
            .collect()
    }

    fn contains(&self, object_ref: &ObjectRef) -> bool {
        self.objects
            .read()
            .expect("object tree lock poisoned")
            .contains_key(object_ref)
    }

    fn all_refs(&self) -> Vec<ObjectRef> {
        self.objects
            .read()
            .expect("object tree lock poisoned")
            .keys()
            .copied()
            .collect()
    }
}
