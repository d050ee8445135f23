use crate::core::{CancelToken, CatalogError, ObjectRef, Result, Value};
use crate::objects::{ObjectSource, SourceObject};
use crate::storage::CatalogStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// The allow-list of principals permitted to see one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    pub principals: BTreeSet<String>,
    /// True when the token was taken from the container rather than
    /// computed from the object's own assignments.
    pub inherited: bool,
}

impl SecurityToken {
    /// The token rendered as the keyword set a security index stores.
    pub fn to_value(&self) -> Value {
        Value::keywords(self.principals.iter().cloned())
    }
}

/// Which roles carry view permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    view_roles: BTreeSet<String>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::new(["Manager"])
    }
}

impl PermissionPolicy {
    pub fn new<I, S>(view_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            view_roles: view_roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.view_roles.insert(role.into());
        self
    }

    pub fn grants_view(&self, role: &str) -> bool {
        self.view_roles.contains(role)
    }

    pub fn view_roles(&self) -> &BTreeSet<String> {
        &self.view_roles
    }
}

/// Emit a progress event after this many visited objects.
const PROGRESS_INTERVAL: usize = 250;

/// What a security recomputation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityReport {
    pub visited: usize,
    /// Catalog records that received a fresh token.
    pub updated: usize,
    pub cancelled: bool,
}

/// Recomputes visibility tokens over a containment subtree and writes
/// them into every catalog carrying the security index.
///
/// The walk is pre-order, a parent's token is final before any child
/// reads it to inherit. Re-running over an unchanged subtree rewrites
/// the same tokens, there is no dirty tracking.
#[derive(Clone)]
pub struct SecurityPropagator {
    source: Arc<dyn ObjectSource>,
    policy: PermissionPolicy,
    index_name: String,
}

impl SecurityPropagator {
    pub fn new(
        source: Arc<dyn ObjectSource>,
        policy: PermissionPolicy,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            policy,
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Token computed from the object's own assignments, ignoring the
    /// container. Roles carrying view are always present so holders of
    /// those roles see everything; locally assigned principals join them.
    fn direct_token(&self, object: &SourceObject) -> SecurityToken {
        let mut principals: BTreeSet<String> = self
            .policy
            .view_roles()
            .iter()
            .map(|role| format!("role:{role}"))
            .collect();
        for assignment in &object.role_assignments {
            if self.policy.grants_view(&assignment.role) {
                principals.insert(format!("user:{}", assignment.principal));
            }
        }
        SecurityToken {
            principals,
            inherited: false,
        }
    }

    fn token_with_parent(
        &self,
        object: &SourceObject,
        parent: Option<&SecurityToken>,
    ) -> SecurityToken {
        match parent {
            Some(token) if object.inherits_security => SecurityToken {
                principals: token.principals.clone(),
                inherited: true,
            },
            _ => self.direct_token(object),
        }
    }

    /// Resolve one object's token by climbing to its nearest override,
    /// or the root when every ancestor inherits.
    pub fn effective_token(&self, object_ref: &ObjectRef) -> Result<SecurityToken> {
        let object = self
            .source
            .get(object_ref)
            .ok_or_else(|| CatalogError::ObjectNotFound(object_ref.to_string()))?;
        let mut owner = object;
        let mut inherited = false;
        while owner.inherits_security {
            let Some(parent_ref) = owner.parent else {
                break;
            };
            let parent = self
                .source
                .get(&parent_ref)
                .ok_or_else(|| CatalogError::ObjectNotFound(parent_ref.to_string()))?;
            owner = parent;
            inherited = true;
        }
        let mut token = self.direct_token(&owner);
        token.inherited = inherited;
        Ok(token)
    }

    /// Recompute tokens for the subtree under `root` and store them in
    /// every catalog that defines the security index. With
    /// `recursive = false` only the root object is touched.
    pub fn recompute(
        &self,
        store: &CatalogStore,
        root: &ObjectRef,
        recursive: bool,
        cancel: &CancelToken,
    ) -> Result<SecurityReport> {
        let targets = self.indexing_catalogs(store)?;
        let mut report = SecurityReport::default();

        // Seed with the root's inherited context so a walk that starts
        // mid-tree still respects tokens established above it.
        let root_object = self
            .source
            .get(root)
            .ok_or_else(|| CatalogError::ObjectNotFound(root.to_string()))?;
        let parent_token = match root_object.parent {
            Some(parent_ref) if root_object.inherits_security => {
                Some(self.effective_token(&parent_ref)?)
            }
            _ => None,
        };

        let mut stack: Vec<(ObjectRef, Option<SecurityToken>)> = vec![(*root, parent_token)];
        while let Some((object_ref, parent_token)) = stack.pop() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!(root = %root, visited = report.visited, "security walk cancelled");
                return Ok(report);
            }
            let Some(object) = self.source.get(&object_ref) else {
                continue;
            };
            let token = self.token_with_parent(&object, parent_token.as_ref());
            report.visited += 1;

            for catalog in &targets {
                let present = store.with_catalog(catalog, |cat| cat.contains(&object_ref))?;
                if present {
                    let mut values = std::collections::BTreeMap::new();
                    values.insert(self.index_name.clone(), token.to_value());
                    store.apply_values(catalog, object_ref, values, Default::default())?;
                    report.updated += 1;
                }
            }
            debug!(object = %object_ref, inherited = token.inherited, "token recomputed");
            if report.visited % PROGRESS_INTERVAL == 0 {
                info!(
                    root = %root,
                    processed = report.visited,
                    updated = report.updated,
                    remaining = stack.len(),
                    "security walk progress"
                );
            }

            if recursive {
                // Reverse push so children pop in ascending order.
                for child in self.source.children(&object_ref).into_iter().rev() {
                    stack.push((child, Some(token.clone())));
                }
            }
        }

        info!(
            root = %root,
            visited = report.visited,
            updated = report.updated,
            "security recomputation finished"
        );
        Ok(report)
    }

    fn indexing_catalogs(&self, store: &CatalogStore) -> Result<Vec<String>> {
        let mut targets = Vec::new();
        for name in store.catalog_names()? {
            if store.with_catalog(&name, |cat| cat.schema.has_index(&self.index_name))? {
                targets.push(name);
            }
        }
        Ok(targets)
    }

    /// An extraction rule computing the token for any object, so plain
    /// reindex runs keep the security index populated too.
    pub fn indexer(&self) -> crate::indexer::IndexerFn {
        let propagator = self.clone();
        Arc::new(move |object: &SourceObject| match object.parent {
            Some(parent_ref) if object.inherits_security => {
                let mut token = propagator.effective_token(&parent_ref)?;
                token.inherited = true;
                Ok(token.to_value())
            }
            _ => Ok(propagator.direct_token(object).to_value()),
        })
    }
}
