use super::step::{HandlerRegistry, StepDeclaration, UpgradeHandler};
use crate::core::{CatalogError, Result, Version};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A declaration bound to its concrete handler.
#[derive(Clone)]
pub struct ResolvedStep {
    pub declaration: StepDeclaration,
    pub handler: Arc<dyn UpgradeHandler>,
}

impl std::fmt::Debug for ResolvedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedStep")
            .field("declaration", &self.declaration)
            .finish()
    }
}

/// Turns the declared step set into the ordered, gap-free chain from a
/// current version to a target, binding handlers along the way.
#[derive(Debug, Clone)]
pub struct ChainResolver {
    steps: Vec<StepDeclaration>,
    handlers: HandlerRegistry,
}

impl ChainResolver {
    pub fn new(steps: Vec<StepDeclaration>, handlers: HandlerRegistry) -> Self {
        Self { steps, handlers }
    }

    pub fn declarations(&self) -> &[StepDeclaration] {
        &self.steps
    }

    /// Versions must strictly increase along every edge and no two edges
    /// may start at the same version, the chain is expected to be linear.
    fn edges_by_source(&self) -> Result<HashMap<Version, &StepDeclaration>> {
        let mut by_source = HashMap::new();
        for step in &self.steps {
            if step.destination <= step.source {
                return Err(CatalogError::Schema(format!(
                    "step '{}' does not increase the version ({} -> {})",
                    step.title, step.source, step.destination
                )));
            }
            if by_source.insert(step.source, step).is_some() {
                return Err(CatalogError::ChainAmbiguity(step.source));
            }
        }
        Ok(by_source)
    }

    /// Resolve the chain from `current` to `target`, or to the highest
    /// reachable version when no target is given.
    pub fn resolve(&self, current: Version, target: Option<Version>) -> Result<Vec<ResolvedStep>> {
        let by_source = self.edges_by_source()?;
        let mut chain = Vec::new();
        let mut frontier = current;

        loop {
            if let Some(target) = target {
                if frontier == target {
                    break;
                }
                if frontier > target {
                    return Err(CatalogError::ChainGap { frontier, target });
                }
            }
            let Some(step) = by_source.get(&frontier) else {
                match target {
                    // No edge leaves the frontier before the target.
                    Some(target) => return Err(CatalogError::ChainGap { frontier, target }),
                    // Unspecified target: the frontier is as far as we go.
                    None => break,
                }
            };
            let handler = self.handlers.get(&step.handler)?;
            debug!(
                title = %step.title,
                source = step.source,
                destination = step.destination,
                "step resolved"
            );
            chain.push(ResolvedStep {
                declaration: (*step).clone(),
                handler,
            });
            frontier = step.destination;
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handlers() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register_fn("noop", |_| Ok(()));
        registry
    }

    fn step(source: Version, destination: Version) -> StepDeclaration {
        StepDeclaration::new(format!("{source} to {destination}"), source, destination, "noop")
    }

    #[test]
    fn resolves_a_linear_chain() {
        let resolver = ChainResolver::new(
            vec![step(2500, 2501), step(2501, 2502), step(2502, 2503)],
            handlers(),
        );
        let chain = resolver.resolve(2500, Some(2503)).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].declaration.source, 2500);
        assert_eq!(chain[2].declaration.destination, 2503);
    }

    #[test]
    fn already_at_target_is_an_empty_chain() {
        let resolver = ChainResolver::new(vec![step(2500, 2501)], handlers());
        assert!(resolver.resolve(2501, Some(2501)).unwrap().is_empty());
    }

    #[test]
    fn gap_in_the_chain_is_reported_with_the_frontier() {
        let resolver = ChainResolver::new(vec![step(2500, 2501), step(2502, 2503)], handlers());
        let err = resolver.resolve(2500, Some(2503)).unwrap_err();
        match err {
            CatalogError::ChainGap { frontier, target } => {
                assert_eq!(frontier, 2501);
                assert_eq!(target, 2503);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_source_versions_are_ambiguous() {
        let resolver = ChainResolver::new(vec![step(2500, 2501), step(2500, 2502)], handlers());
        assert!(matches!(
            resolver.resolve(2500, Some(2502)),
            Err(CatalogError::ChainAmbiguity(2500))
        ));
    }

    #[test]
    fn unspecified_target_walks_to_the_highest_reachable_version() {
        let resolver = ChainResolver::new(vec![step(2500, 2501), step(2501, 2502)], handlers());
        let chain = resolver.resolve(2500, None).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.last().unwrap().declaration.destination, 2502);
    }

    #[test]
    fn missing_handler_fails_at_build_time() {
        let declarations = vec![StepDeclaration::new("broken", 2500, 2501, "ghost")];
        let resolver = ChainResolver::new(declarations, handlers());
        assert!(matches!(
            resolver.resolve(2500, Some(2501)),
            Err(CatalogError::HandlerNotFound(_))
        ));
    }

    #[test]
    fn overshooting_the_target_is_a_gap() {
        let resolver = ChainResolver::new(vec![step(2500, 2505)], handlers());
        assert!(matches!(
            resolver.resolve(2500, Some(2503)),
            Err(CatalogError::ChainGap { .. })
        ));
    }
}
