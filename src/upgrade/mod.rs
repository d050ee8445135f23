pub mod resolver;
pub mod runner;
pub mod state;
pub mod step;

pub use resolver::{ChainResolver, ResolvedStep};
pub use runner::{ChainReport, StepRunner};
pub use state::UpgradeState;
pub use step::{
    FnHandler, HandlerRegistry, StepDeclaration, StepResult, StepStatus, UpgradeHandler,
};

use crate::core::CancelToken;
use crate::registry::SettingsRegistry;
use crate::reindex::Reindexer;
use crate::security::SecurityPropagator;
use crate::storage::{CatalogStore, SchemaManager};

/// Everything a step handler may touch while it runs.
#[derive(Clone)]
pub struct UpgradeContext {
    pub store: CatalogStore,
    pub schema: SchemaManager,
    pub reindexer: Reindexer,
    pub security: SecurityPropagator,
    pub settings: SettingsRegistry,
    pub cancel: CancelToken,
}
