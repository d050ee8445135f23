use super::UpgradeContext;
use crate::core::{CatalogError, Result, Version};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One declared migration edge, as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDeclaration {
    pub title: String,
    pub description: String,
    pub source: Version,
    pub destination: Version,
    /// Name the handler registry resolves at chain-build time.
    pub handler: String,
}

impl StepDeclaration {
    pub fn new(
        title: impl Into<String>,
        source: Version,
        destination: Version,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            source,
            destination,
            handler: handler.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Lifecycle of one step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Committed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of running one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// False when the step was skipped because the version had already
    /// passed its destination.
    pub applied: bool,
    pub version_after: Version,
}

/// The work a migration step performs against the engine's components.
///
/// Handlers must be safe to re-run from the start: a crash between the
/// work and the version advance is recovered by running the step again.
#[async_trait]
pub trait UpgradeHandler: Send + Sync {
    async fn run(&self, ctx: &UpgradeContext) -> Result<()>;
}

/// Adapter turning a plain closure into a handler.
pub struct FnHandler {
    func: Arc<dyn Fn(&UpgradeContext) -> Result<()> + Send + Sync>,
}

impl FnHandler {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&UpgradeContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl UpgradeHandler for FnHandler {
    async fn run(&self, ctx: &UpgradeContext) -> Result<()> {
        (self.func)(ctx)
    }
}

/// Named handler implementations, looked up while building a chain so a
/// missing handler fails before any step runs.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn UpgradeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn UpgradeHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&UpgradeContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnHandler::new(func)));
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn UpgradeHandler>> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::HandlerNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
