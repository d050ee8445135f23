pub mod memory;

pub use memory::MemoryTree;

use crate::core::{ObjectRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A principal granted a role directly on an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal: String,
    pub role: String,
}

impl RoleAssignment {
    pub fn new(principal: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            role: role.into(),
        }
    }
}

/// A content object as seen by extraction rules and the security walker.
///
/// Catalogs never store these; they hold projections computed from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceObject {
    pub id: ObjectRef,
    pub parent: Option<ObjectRef>,
    pub object_type: String,
    pub fields: BTreeMap<String, Value>,
    pub role_assignments: Vec<RoleAssignment>,
    /// When true the object takes its security token from its container;
    /// when false its own assignments override the inherited token.
    pub inherits_security: bool,
}

impl SourceObject {
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            id: ObjectRef::new(),
            parent: None,
            object_type: object_type.into(),
            fields: BTreeMap::new(),
            role_assignments: Vec::new(),
            inherits_security: true,
        }
    }

    pub fn with_parent(mut self, parent: ObjectRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_role(mut self, principal: impl Into<String>, role: impl Into<String>) -> Self {
        self.role_assignments.push(RoleAssignment::new(principal, role));
        self
    }

    /// Mark this object as a security override point.
    pub fn with_security_override(mut self) -> Self {
        self.inherits_security = false;
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Read access to the containment hierarchy the engine operates on.
///
/// The object graph is owned by the host platform; the engine only ever
/// reads it. Implementations must return children in a stable order so
/// walks and batches are deterministic.
pub trait ObjectSource: Send + Sync {
    fn get(&self, object_ref: &ObjectRef) -> Option<SourceObject>;

    /// Direct children of `parent`, ascending by reference.
    fn children(&self, parent: &ObjectRef) -> Vec<ObjectRef>;

    fn contains(&self, object_ref: &ObjectRef) -> bool;

    /// Every object reference in the tree, ascending.
    fn all_refs(&self) -> Vec<ObjectRef>;
}
