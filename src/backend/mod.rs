//! Provisioning backend seam.
//!
//! The core never talks to a network itself; it emits a resolved
//! [`ResourceGraph`](crate::planner::ResourceGraph) and hands it to a
//! [`ProvisioningBackend`] collaborator. The backend owns all I/O: creating,
//! updating, and tearing down real resources, resolving opaque handles the
//! storage planner leaves blank, and polling rollout health. The
//! [`GraphApplier`] drives a backend through the graph's apply order and
//! enforces the circuit-breaker rollout policy.

mod applier;
mod memory;

pub use applier::{ApplyOutcome, GraphApplier};
pub use memory::{CreatedResource, InMemoryBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::planner::{ComputePlan, HealthSignal, NetworkPlan, SecurityPlan, ServicePlan, StoragePlan};

/// A collaborator that turns plan fragments into real resources.
///
/// Methods are invoked in the graph's apply order; each receives the
/// identifiers of the resources it depends on and returns an opaque handle
/// for the resource it created. Implementations own retry, pacing, and
/// polling mechanics; the core only dictates ordering and rollout policy.
#[async_trait]
pub trait ProvisioningBackend: Send {
    /// Creates the VPC and subnets.
    async fn create_network(&mut self, plan: &NetworkPlan) -> Result<String>;

    /// Creates the security group inside the network.
    async fn create_security_group(
        &mut self,
        plan: &SecurityPlan,
        network_id: &str,
    ) -> Result<String>;

    /// Creates the filesystem and access point, guarded by the group.
    /// Returns the filesystem handle the storage plan left unresolved.
    async fn create_filesystem(
        &mut self,
        plan: &StoragePlan,
        security_group_id: &str,
    ) -> Result<String>;

    /// Registers the task definition, binding volumes to the filesystem.
    async fn register_task(&mut self, plan: &ComputePlan, filesystem_ids: &[String])
        -> Result<String>;

    /// Creates the load-balanced service running the task.
    async fn create_service(
        &mut self,
        plan: &ServicePlan,
        task_definition_id: &str,
        security_group_id: &str,
    ) -> Result<String>;

    /// Reports the health of the service's active revision.
    async fn check_service_health(&mut self, service_id: &str) -> Result<HealthSignal>;

    /// Restores the last known-healthy revision of the service.
    async fn rollback_service(&mut self, service_id: &str) -> Result<()>;
}

/// Opaque handles resolved by the backend during an apply run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionedResources {
    /// Network handle.
    pub network_id: Option<String>,
    /// Security group handle.
    pub security_group_id: Option<String>,
    /// Filesystem handles, in storage plan order.
    pub filesystem_ids: Vec<String>,
    /// Task definition handle.
    pub task_definition_id: Option<String>,
    /// Service handle.
    pub service_id: Option<String>,
}
