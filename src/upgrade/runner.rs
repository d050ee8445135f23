use super::UpgradeContext;
use super::resolver::ResolvedStep;
use super::state::UpgradeState;
use super::step::{StepResult, StepStatus};
use crate::core::{CatalogError, Result, Version};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// What a chain run did overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReport {
    pub applied: usize,
    pub skipped: usize,
    pub version_after: Version,
}

/// Executes resolved steps one at a time, advancing the durable version
/// exactly once per committed step.
///
/// A step whose destination the version has already passed is skipped,
/// which is what makes re-running a half-finished chain safe.
#[derive(Debug, Clone)]
pub struct StepRunner {
    state: Arc<UpgradeState>,
}

impl StepRunner {
    pub fn new(state: Arc<UpgradeState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &UpgradeState {
        &self.state
    }

    pub async fn run_step(&self, step: &ResolvedStep, ctx: &UpgradeContext) -> Result<StepResult> {
        let decl = &step.declaration;
        let current = self.state.current()?;
        if current >= decl.destination {
            info!(
                title = %decl.title,
                source = decl.source,
                destination = decl.destination,
                current,
                "step already applied, skipping"
            );
            return Ok(StepResult {
                applied: false,
                version_after: current,
            });
        }

        info!(
            title = %decl.title,
            source = decl.source,
            destination = decl.destination,
            outcome = %StepStatus::Running,
            "step started"
        );
        let started = Instant::now();
        match step.handler.run(ctx).await {
            Ok(()) => {
                // Version advance and completion are one durable write, so
                // a crash in between re-runs the step instead of needing a
                // recovery protocol.
                self.state.advance_to(decl.destination)?;
                info!(
                    title = %decl.title,
                    source = decl.source,
                    destination = decl.destination,
                    outcome = %StepStatus::Committed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "step committed"
                );
                Ok(StepResult {
                    applied: true,
                    version_after: decl.destination,
                })
            }
            Err(cause) => {
                warn!(
                    title = %decl.title,
                    source = decl.source,
                    destination = decl.destination,
                    outcome = %StepStatus::Failed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    cause = %cause,
                    "step failed"
                );
                Err(CatalogError::StepFailed {
                    title: decl.title.clone(),
                    source_version: decl.source,
                    destination: decl.destination,
                    cause: cause.to_string(),
                })
            }
        }
    }

    /// Run the chain strictly in order, halting on the first failure and
    /// leaving the version at the last committed step.
    pub async fn run_chain(
        &self,
        chain: &[ResolvedStep],
        ctx: &UpgradeContext,
    ) -> Result<ChainReport> {
        let mut report = ChainReport {
            applied: 0,
            skipped: 0,
            version_after: self.state.current()?,
        };
        for step in chain {
            let result = self.run_step(step, ctx).await?;
            if result.applied {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
            report.version_after = result.version_after;
        }
        info!(
            applied = report.applied,
            skipped = report.skipped,
            version = report.version_after,
            "chain finished"
        );
        Ok(report)
    }
}
