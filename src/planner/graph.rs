//! Resource graph assembly and the top-level planning entry point.
//!
//! [`TopologyPlanner::plan`] runs the planners in their fixed dependency
//! order (network, then security and storage, then compute, then service)
//! and assembles the immutable [`ResourceGraph`] handed to a provisioning
//! backend. Planning is all-or-nothing: any planner failure aborts the run
//! and no partial graph is ever returned. The graph also carries the ordered
//! apply plan the backend must follow, because later resources reference
//! identifiers produced by earlier ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::descriptor::{DescriptorHasher, DescriptorValidator, TopologyDescriptor};
use crate::error::Result;

use super::compute::{ComputePlan, ComputePlanner};
use super::network::{NetworkPlan, NetworkPlanner};
use super::security::{SecurityPlan, SecurityPlanner, TrafficIntent};
use super::service::{ServicePlan, ServicePlanner};
use super::storage::{StoragePlan, StoragePlanner};

/// One step of the ordered apply plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyStep {
    /// Create the VPC and subnets.
    Network,
    /// Create the shared security group.
    SecurityGroup,
    /// Create the filesystem and access point.
    Filesystem,
    /// Register the task definition.
    TaskDefinition,
    /// Create the load-balanced service and drive its rollout.
    Service,
}

/// The fixed apply order. Later steps reference identifiers produced by
/// earlier ones, so a backend must not reorder them.
pub const APPLY_ORDER: [ApplyStep; 5] = [
    ApplyStep::Network,
    ApplyStep::SecurityGroup,
    ApplyStep::Filesystem,
    ApplyStep::TaskDefinition,
    ApplyStep::Service,
];

/// The fully resolved, dependency-ordered resource graph for one
/// application. Terminal artifact of a planning run; immutable, held by no
/// one after being handed to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceGraph {
    /// Unique identifier of this planning run.
    pub run_id: Uuid,
    /// When the graph was planned.
    pub planned_at: DateTime<Utc>,
    /// Fingerprint of the descriptor this graph was derived from.
    pub descriptor_hash: String,
    /// Qualified application name.
    pub app_name: String,
    /// Network plan fragment.
    pub network: NetworkPlan,
    /// Security plan fragment.
    pub security: SecurityPlan,
    /// Storage plan fragments, in binding order.
    pub storage: Vec<StoragePlan>,
    /// Compute plan fragment.
    pub compute: ComputePlan,
    /// Service plan fragment.
    pub service: ServicePlan,
    /// Ordered apply plan for the backend.
    pub apply_order: Vec<ApplyStep>,
}

/// The top-level planner composing all plan fragments.
#[derive(Debug, Default)]
pub struct TopologyPlanner {
    validator: DescriptorValidator,
    hasher: DescriptorHasher,
}

impl TopologyPlanner {
    /// Creates a new topology planner.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            validator: DescriptorValidator::new(),
            hasher: DescriptorHasher::new(),
        }
    }

    /// Plans the full resource graph for a descriptor.
    ///
    /// No externally-facing security rules are synthesized; callers that
    /// need ports opened beyond the intra-group filesystem rule declare them
    /// via [`TopologyPlanner::plan_with_intents`].
    ///
    /// # Errors
    ///
    /// Returns the first descriptor validation or planning error; planning
    /// is all-or-nothing.
    pub fn plan(&self, descriptor: &TopologyDescriptor) -> Result<ResourceGraph> {
        self.plan_with_intents(descriptor, &[])
    }

    /// Plans the full resource graph with caller-declared traffic intents.
    ///
    /// # Errors
    ///
    /// As [`TopologyPlanner::plan`].
    pub fn plan_with_intents(
        &self,
        descriptor: &TopologyDescriptor,
        intents: &[TrafficIntent],
    ) -> Result<ResourceGraph> {
        let validation = self.validator.validate(descriptor)?;
        for warning in &validation.warnings {
            tracing::warn!("{warning}");
        }

        // Strictly linear dependency order; each planner consumes only the
        // outputs of planners earlier in this order.
        let network = NetworkPlanner::new().plan(descriptor)?;
        let security = SecurityPlanner::new().plan(descriptor, intents)?;
        let storage = vec![StoragePlanner::new().plan(descriptor)?];
        let compute = ComputePlanner::new().plan(descriptor, &storage)?;
        let service = ServicePlanner::new().plan(descriptor, &compute, &security)?;

        let graph = ResourceGraph {
            run_id: Uuid::new_v4(),
            planned_at: Utc::now(),
            descriptor_hash: self.hasher.hash_descriptor(descriptor),
            app_name: descriptor.qualified_name(),
            network,
            security,
            storage,
            compute,
            service,
            apply_order: APPLY_ORDER.to_vec(),
        };

        info!(
            "Planned resource graph {} for '{}': {} subnets, {} security rule(s), \
             {} storage plan(s)",
            graph.run_id,
            graph.app_name,
            graph.network.subnet_count(),
            graph.security.rules.len(),
            graph.storage.len()
        );
        Ok(graph)
    }
}

impl ResourceGraph {
    /// Serializes the graph to pretty-printed JSON for backend handoff.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::TopoplanError::internal(format!("JSON encoding: {e}")))
    }

    /// Returns the storage plan a volume binding references, if present.
    #[must_use]
    pub fn storage_for(&self, volume_name: &str) -> Option<&StoragePlan> {
        self.storage.iter().find(|s| s.volume_name == volume_name)
    }
}

impl std::fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::SecurityGroup => "security-group",
            Self::Filesystem => "filesystem",
            Self::TaskDefinition => "task-definition",
            Self::Service => "service",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Resource graph for '{}' ({})", self.app_name, self.run_id)?;
        writeln!(
            f,
            "  network: {} ({} subnets across {} AZs)",
            self.network.cidr_block,
            self.network.subnet_count(),
            self.network.az_count
        )?;
        writeln!(
            f,
            "  security: '{}' ({} rules)",
            self.security.group_name,
            self.security.rules.len()
        )?;
        for storage in &self.storage {
            writeln!(
                f,
                "  storage: volume '{}' at '{}'",
                storage.volume_name, storage.access_point_path
            )?;
        }
        writeln!(
            f,
            "  compute: {} CPU / {} MiB, container '{}' port {}",
            self.compute.cpu_units,
            self.compute.memory_mib,
            self.compute.container.name,
            self.compute.container.port
        )?;
        writeln!(
            f,
            "  service: {} replica(s), listener {} -> {}",
            self.service.desired_count,
            self.service.load_balancer.listener_port,
            self.service.load_balancer.target_port
        )?;
        write!(f, "  apply order:")?;
        for step in &self.apply_order {
            write!(f, " {step}")?;
        }
        Ok(())
    }
}
