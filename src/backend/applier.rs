//! Graph applier: drives a provisioning backend through an apply plan.
//!
//! Resources are created strictly in the graph's apply order because later
//! resources reference identifiers produced by earlier ones. After the
//! service is created the applier executes the rollout contract: observe
//! health within the bounded window, trip the circuit breaker on failure,
//! restore the previous revision, and report the terminal rollout state.

use tracing::{debug, error, info, warn};

use crate::error::{ApplyError, Result};
use crate::planner::{ApplyStep, HealthSignal, ResourceGraph, RolloutState, RolloutTracker};

use super::{ProvisionedResources, ProvisioningBackend};

/// Applier walking one resource graph against one backend.
#[derive(Debug)]
pub struct GraphApplier<'a, B: ProvisioningBackend> {
    backend: &'a mut B,
}

/// Result of applying a resource graph.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// Handles resolved by the backend, in creation order.
    pub resources: ProvisionedResources,
    /// Terminal state of the rollout attempt.
    pub rollout: RolloutState,
}

impl<'a, B: ProvisioningBackend> GraphApplier<'a, B> {
    /// Creates a new applier over the given backend.
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    /// Applies the graph in its declared order and drives the rollout.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails to create a resource, when a
    /// health probe fails, or when the rollback call itself fails. A rollout
    /// that ends in [`RolloutState::Failed`] after a successful rollback
    /// call is reported in the outcome, not as an error.
    pub async fn apply(&mut self, graph: &ResourceGraph) -> Result<ApplyOutcome> {
        info!("Applying resource graph {} ({})", graph.run_id, graph.app_name);

        let mut resources = ProvisionedResources::default();

        for step in &graph.apply_order {
            debug!("Applying step: {step}");
            match step {
                ApplyStep::Network => {
                    let id = self.backend.create_network(&graph.network).await?;
                    info!("Created network '{id}'");
                    resources.network_id = Some(id);
                }
                ApplyStep::SecurityGroup => {
                    let network_id = resources.network_id.as_deref().ok_or_else(|| {
                        ApplyError::create_failed(
                            "security-group",
                            &graph.security.group_name,
                            "network not yet created; apply order violated",
                        )
                    })?;
                    let id = self
                        .backend
                        .create_security_group(&graph.security, network_id)
                        .await?;
                    info!("Created security group '{id}'");
                    resources.security_group_id = Some(id);
                }
                ApplyStep::Filesystem => {
                    let group_id = resources.security_group_id.as_deref().ok_or_else(|| {
                        ApplyError::create_failed(
                            "filesystem",
                            &graph.app_name,
                            "security group not yet created; apply order violated",
                        )
                    })?;
                    for storage in &graph.storage {
                        let id = self.backend.create_filesystem(storage, group_id).await?;
                        info!("Created filesystem '{id}' for volume '{}'", storage.volume_name);
                        resources.filesystem_ids.push(id);
                    }
                }
                ApplyStep::TaskDefinition => {
                    let id = self
                        .backend
                        .register_task(&graph.compute, &resources.filesystem_ids)
                        .await?;
                    info!("Registered task definition '{id}'");
                    resources.task_definition_id = Some(id);
                }
                ApplyStep::Service => {
                    let task_id = resources.task_definition_id.as_deref().ok_or_else(|| {
                        ApplyError::create_failed(
                            "service",
                            &graph.app_name,
                            "task definition not yet registered; apply order violated",
                        )
                    })?;
                    let group_id = resources.security_group_id.as_deref().ok_or_else(|| {
                        ApplyError::create_failed(
                            "service",
                            &graph.app_name,
                            "security group not yet created; apply order violated",
                        )
                    })?;
                    let id = self
                        .backend
                        .create_service(&graph.service, task_id, group_id)
                        .await?;
                    info!("Created service '{id}'");
                    resources.service_id = Some(id);
                }
            }
        }

        let service_id = resources.service_id.clone().ok_or_else(|| {
            ApplyError::create_failed("service", &graph.app_name, "apply plan contained no service step")
        })?;

        let rollout = self.drive_rollout(graph, &service_id).await?;

        Ok(ApplyOutcome { resources, rollout })
    }

    /// Executes the rollout contract owned by the service planner.
    async fn drive_rollout(
        &mut self,
        graph: &ResourceGraph,
        service_id: &str,
    ) -> Result<RolloutState> {
        let policy = graph.service.rollout_policy;
        let mut tracker = RolloutTracker::new();
        tracker.begin()?;

        match self.observe_phase(service_id, policy.max_health_checks).await? {
            HealthSignal::Healthy => {
                tracker.observe(HealthSignal::Healthy)?;
                info!("Rollout of '{service_id}' reached {}", tracker.state());
                return Ok(tracker.state());
            }
            verdict => {
                // An exhausted window counts as a failed health check.
                warn!("Rollout of '{service_id}' failed health checks ({verdict:?})");
                tracker.observe(HealthSignal::Unhealthy)?;
            }
        }

        // Circuit breaker tripped: restore the previous revision. No manual
        // or partial rollback path exists.
        info!("Circuit breaker tripped for '{service_id}', rolling back");
        self.backend.rollback_service(service_id).await?;

        match self.observe_phase(service_id, policy.max_health_checks).await? {
            HealthSignal::Healthy => {
                tracker.observe(HealthSignal::Healthy)?;
                info!("Previous revision of '{service_id}' restored");
            }
            _ => {
                tracker.observe(HealthSignal::Unhealthy)?;
                error!("Rollback of '{service_id}' did not reach a healthy state");
            }
        }

        Ok(tracker.state())
    }

    /// Observes health until a verdict or the window is exhausted.
    /// Returns [`HealthSignal::Stabilizing`] only when the window closes
    /// without a verdict.
    async fn observe_phase(&mut self, service_id: &str, window: u32) -> Result<HealthSignal> {
        for check in 0..window.max(1) {
            match self.backend.check_service_health(service_id).await? {
                HealthSignal::Stabilizing => {
                    debug!("Health check {check}: '{service_id}' still stabilizing");
                }
                verdict => return Ok(verdict),
            }
        }
        Ok(HealthSignal::Stabilizing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::TopoplanError;
    use crate::planner::fixtures::gitness_descriptor;
    use crate::planner::TopologyPlanner;

    fn graph() -> ResourceGraph {
        TopologyPlanner::new().plan(&gitness_descriptor()).unwrap()
    }

    #[tokio::test]
    async fn test_apply_creates_resources_in_order() {
        let mut backend = InMemoryBackend::new();
        let graph = graph();

        let outcome = GraphApplier::new(&mut backend).apply(&graph).await.unwrap();

        assert_eq!(
            backend.created_kinds(),
            vec![
                "network",
                "security-group",
                "filesystem",
                "task-definition",
                "service"
            ]
        );
        assert_eq!(outcome.rollout, RolloutState::Steady);
        assert!(outcome.resources.network_id.is_some());
        assert_eq!(outcome.resources.filesystem_ids.len(), 1);
        assert_eq!(backend.rollback_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_health_check_triggers_rollback_to_steady() {
        let mut backend = InMemoryBackend::new().with_health_script(vec![
            HealthSignal::Stabilizing,
            HealthSignal::Unhealthy,
            HealthSignal::Healthy,
        ]);
        let graph = graph();

        let outcome = GraphApplier::new(&mut backend).apply(&graph).await.unwrap();

        assert_eq!(outcome.rollout, RolloutState::Steady);
        assert_eq!(backend.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_terminal_failed() {
        let mut backend = InMemoryBackend::new()
            .with_health_script(vec![HealthSignal::Unhealthy, HealthSignal::Unhealthy]);
        let graph = graph();

        let outcome = GraphApplier::new(&mut backend).apply(&graph).await.unwrap();

        assert_eq!(outcome.rollout, RolloutState::Failed);
        assert_eq!(backend.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_window_counts_as_unhealthy() {
        let window = graph().service.rollout_policy.max_health_checks as usize;
        let mut script = vec![HealthSignal::Stabilizing; window];
        script.push(HealthSignal::Healthy); // rollback phase verdict
        let mut backend = InMemoryBackend::new().with_health_script(script);

        let outcome = GraphApplier::new(&mut backend).apply(&graph()).await.unwrap();

        assert_eq!(outcome.rollout, RolloutState::Steady);
        assert_eq!(backend.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_apply() {
        let mut backend = InMemoryBackend::new().failing_on("filesystem");
        let graph = graph();

        let err = GraphApplier::new(&mut backend).apply(&graph).await.unwrap_err();
        assert!(matches!(err, TopoplanError::Apply(_)));
        // Nothing after the failing step was created.
        assert_eq!(backend.created_kinds(), vec!["network", "security-group"]);
    }
}
