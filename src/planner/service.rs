//! Service planner: load-balanced service composition and rollout policy.
//!
//! Wraps the compute plan in a publicly reachable, load-balanced service.
//! Policy decisions baked into this planner:
//!
//! - `desired_count` defaults to 1. Single replica is a deliberate
//!   simplicity/cost tradeoff, not an oversight.
//! - Deployments use a circuit breaker with automatic rollback: a revision
//!   that fails its health checks within the bounded observation window is
//!   reverted to the last known-healthy revision. This is the system's only
//!   automated failure-recovery behavior; there is no partial or manual
//!   rollback path.
//! - The service reuses the security group produced by the security planner
//!   so the filesystem-access rule and inbound web-traffic rules coexist in
//!   one group.
//!
//! The rollout state machine is owned by this module's contract and executed
//! by the provisioning backend (see [`crate::backend::GraphApplier`]).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::TopologyDescriptor;
use crate::error::{Result, RolloutError};

use super::compute::ComputePlan;
use super::security::SecurityPlan;

/// Default replica count.
pub const DEFAULT_DESIRED_COUNT: u32 = 1;

/// Default bound on health-check observations per rollout phase.
pub const DEFAULT_MAX_HEALTH_CHECKS: u32 = 10;

/// Rollout policy the backend must honor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolloutPolicy {
    /// Whether the deployment circuit breaker is enabled.
    pub circuit_breaker_enabled: bool,
    /// Whether a tripped circuit breaker triggers automatic rollback.
    pub auto_rollback: bool,
    /// Bounded observation window: health checks per rollout phase.
    pub max_health_checks: u32,
}

/// Load balancer listener wiring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    /// Public listener port.
    pub listener_port: u16,
    /// Container port traffic is forwarded to.
    pub target_port: u16,
}

/// The derived service definition for one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePlan {
    /// Number of task replicas to run.
    pub desired_count: u32,
    /// Rollout policy the backend must honor.
    pub rollout_policy: RolloutPolicy,
    /// Load balancer wiring.
    pub load_balancer: LoadBalancerSpec,
    /// Name of the shared security group; the service never creates its own.
    pub security_group: String,
}

/// Planner composing the service from the compute and security plans.
#[derive(Debug, Default)]
pub struct ServicePlanner;

/// State of a single deployment rollout attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutState {
    /// Initial state; no revision is being deployed yet.
    Pending,
    /// A new revision is being deployed and observed.
    RollingOut,
    /// Terminal success: the service runs a healthy revision.
    Steady,
    /// The circuit breaker tripped; the previous revision is being restored.
    RollingBack,
    /// Terminal failure: the rollback itself failed.
    Failed,
}

/// Health observation reported by the backend for the active revision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthSignal {
    /// The revision passes its health checks.
    Healthy,
    /// The revision fails its health checks.
    Unhealthy,
    /// No verdict yet; the revision is still stabilizing.
    Stabilizing,
}

/// Tracks one rollout attempt through the state machine:
/// `PENDING -> ROLLING_OUT -> {STEADY | ROLLING_BACK -> {STEADY | FAILED}}`.
#[derive(Debug, Clone, Copy)]
pub struct RolloutTracker {
    state: RolloutState,
}

impl Default for RolloutPolicy {
    fn default() -> Self {
        Self {
            circuit_breaker_enabled: true,
            auto_rollback: true,
            max_health_checks: DEFAULT_MAX_HEALTH_CHECKS,
        }
    }
}

impl ServicePlanner {
    /// Creates a new service planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Derives the service plan from the descriptor and earlier plans.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` for uniformity with the other
    /// planners and to keep room for future policy checks.
    pub fn plan(
        &self,
        descriptor: &TopologyDescriptor,
        compute: &ComputePlan,
        security: &SecurityPlan,
    ) -> Result<ServicePlan> {
        let plan = ServicePlan {
            desired_count: DEFAULT_DESIRED_COUNT,
            rollout_policy: RolloutPolicy::default(),
            load_balancer: LoadBalancerSpec {
                listener_port: descriptor.listener_port,
                target_port: compute.container.port,
            },
            security_group: security.group_name.clone(),
        };

        debug!(
            "Derived service plan: {} replica(s), listener {} -> {}, group '{}'",
            plan.desired_count,
            plan.load_balancer.listener_port,
            plan.load_balancer.target_port,
            plan.security_group
        );
        Ok(plan)
    }
}

impl Default for RolloutTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RolloutTracker {
    /// Creates a tracker in the initial `PENDING` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RolloutState::Pending,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RolloutState {
        self.state
    }

    /// Returns true if the rollout attempt has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.state, RolloutState::Steady | RolloutState::Failed)
    }

    /// Begins the rollout: `PENDING -> ROLLING_OUT`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollout has already begun.
    pub fn begin(&mut self) -> Result<RolloutState> {
        match self.state {
            RolloutState::Pending => {
                self.state = RolloutState::RollingOut;
                Ok(self.state)
            }
            state => Err(Self::invalid(state, "begin")),
        }
    }

    /// Applies a health verdict to the active phase.
    ///
    /// - `ROLLING_OUT` + healthy -> `STEADY`
    /// - `ROLLING_OUT` + unhealthy -> `ROLLING_BACK` (circuit breaker trips;
    ///   the previous revision is restored, never left degraded)
    /// - `ROLLING_BACK` + healthy -> `STEADY` (previous revision restored)
    /// - `ROLLING_BACK` + unhealthy -> `FAILED`
    ///
    /// A [`HealthSignal::Stabilizing`] verdict leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error when called in `PENDING` or a terminal state.
    pub fn observe(&mut self, signal: HealthSignal) -> Result<RolloutState> {
        if signal == HealthSignal::Stabilizing {
            return match self.state {
                RolloutState::RollingOut | RolloutState::RollingBack => Ok(self.state),
                state => Err(Self::invalid(state, "observe")),
            };
        }

        self.state = match (self.state, signal) {
            (RolloutState::RollingOut, HealthSignal::Healthy)
            | (RolloutState::RollingBack, HealthSignal::Healthy) => RolloutState::Steady,
            (RolloutState::RollingOut, HealthSignal::Unhealthy) => RolloutState::RollingBack,
            (RolloutState::RollingBack, HealthSignal::Unhealthy) => RolloutState::Failed,
            (state, _) => return Err(Self::invalid(state, "observe")),
        };
        Ok(self.state)
    }

    fn invalid(state: RolloutState, event: &str) -> crate::error::TopoplanError {
        RolloutError::InvalidTransition {
            state: state.to_string(),
            event: String::from(event),
        }
        .into()
    }
}

impl std::fmt::Display for RolloutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::RollingOut => "ROLLING_OUT",
            Self::Steady => "STEADY",
            Self::RollingBack => "ROLLING_BACK",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::compute::ComputePlanner;
    use crate::planner::fixtures::gitness_descriptor;
    use crate::planner::security::SecurityPlanner;
    use crate::planner::storage::StoragePlanner;

    fn service_plan() -> ServicePlan {
        let desc = gitness_descriptor();
        let storage = StoragePlanner::new().plan(&desc).unwrap();
        let compute = ComputePlanner::new()
            .plan(&desc, std::slice::from_ref(&storage))
            .unwrap();
        let security = SecurityPlanner::new().plan(&desc, &[]).unwrap();
        ServicePlanner::new().plan(&desc, &compute, &security).unwrap()
    }

    #[test]
    fn test_service_plan_policy_defaults() {
        let plan = service_plan();

        assert_eq!(plan.desired_count, 1);
        assert!(plan.rollout_policy.circuit_breaker_enabled);
        assert!(plan.rollout_policy.auto_rollback);
        assert_eq!(plan.load_balancer.listener_port, 80);
        assert_eq!(plan.load_balancer.target_port, 3000);
    }

    #[test]
    fn test_service_reuses_security_group() {
        let plan = service_plan();
        assert_eq!(plan.security_group, "gitness-dev-web");
    }

    #[test]
    fn test_successful_rollout() {
        let mut tracker = RolloutTracker::new();
        assert_eq!(tracker.state(), RolloutState::Pending);

        assert_eq!(tracker.begin().unwrap(), RolloutState::RollingOut);
        assert_eq!(
            tracker.observe(HealthSignal::Healthy).unwrap(),
            RolloutState::Steady
        );
        assert!(tracker.is_terminal());
    }

    #[test]
    fn test_failed_health_check_rolls_back_then_recovers() {
        let mut tracker = RolloutTracker::new();
        tracker.begin().unwrap();

        // A failed health check never leaves the rollout in ROLLING_OUT and
        // never silently succeeds.
        assert_eq!(
            tracker.observe(HealthSignal::Unhealthy).unwrap(),
            RolloutState::RollingBack
        );
        assert_eq!(
            tracker.observe(HealthSignal::Healthy).unwrap(),
            RolloutState::Steady
        );
        assert!(tracker.is_terminal());
    }

    #[test]
    fn test_rollback_failure_is_terminal() {
        let mut tracker = RolloutTracker::new();
        tracker.begin().unwrap();
        tracker.observe(HealthSignal::Unhealthy).unwrap();

        assert_eq!(
            tracker.observe(HealthSignal::Unhealthy).unwrap(),
            RolloutState::Failed
        );
        assert!(tracker.is_terminal());
        assert!(tracker.observe(HealthSignal::Healthy).is_err());
    }

    #[test]
    fn test_stabilizing_keeps_state() {
        let mut tracker = RolloutTracker::new();
        tracker.begin().unwrap();
        assert_eq!(
            tracker.observe(HealthSignal::Stabilizing).unwrap(),
            RolloutState::RollingOut
        );
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut tracker = RolloutTracker::new();
        assert!(tracker.observe(HealthSignal::Healthy).is_err());

        tracker.begin().unwrap();
        assert!(tracker.begin().is_err());

        tracker.observe(HealthSignal::Healthy).unwrap();
        assert!(tracker.observe(HealthSignal::Stabilizing).is_err());
    }
}
