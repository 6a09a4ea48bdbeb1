//! Compute planner: task sizing, container spec, and volume bindings.
//!
//! Builds the task resource specification for the single long-running
//! container. Sizing is validated against a closed table of supported
//! (cpu, memory) pairings; anything off the table fails loudly rather than
//! being rounded. The environment declaration list is folded into a map with
//! duplicate keys rejected (last-write-wins is not allowed), and every
//! volume binding must reference a storage plan produced in the same run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::descriptor::TopologyDescriptor;
use crate::error::{DanglingReferenceError, DuplicateKeyError, Result, UnsupportedSizingError};

use super::storage::StoragePlan;

/// Supported (cpu units, memory MiB) pairings for the target execution
/// environment. The table is closed: unlisted pairings are rejected.
const SUPPORTED_TASK_SIZES: &[(u32, &[u32])] = &[
    (256, &[512, 1024, 2048]),
    (512, &[1024, 2048, 3072, 4096]),
    (1024, &[2048, 3072, 4096, 5120, 6144, 7168, 8192]),
    (
        2048,
        &[
            4096, 5120, 6144, 7168, 8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384,
        ],
    ),
    (
        4096,
        &[
            8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384, 17408, 18432, 19456,
            20480, 21504, 22528, 23552, 24576, 25600, 26624, 27648, 28672, 29696, 30720,
        ],
    ),
];

/// The shared volume is writable for this workload class; the application
/// stores session and state data on it.
const VOLUME_READ_ONLY: bool = false;

/// Specification of the single container in the task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Container image reference.
    pub image: String,
    /// Port the container listens on.
    pub port: u16,
    /// Working directory inside the container.
    pub working_directory: String,
    /// Environment map with unique keys, in sorted order.
    pub env: BTreeMap<String, String>,
    /// Log stream prefix for the container's log driver.
    pub log_stream_prefix: String,
}

/// A named volume bound into the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeBinding {
    /// Name of the storage plan this binding references.
    pub name: String,
    /// Mount path inside the container.
    pub mount_path: String,
    /// Whether the mount is read-only. Always false for this workload class.
    pub read_only: bool,
}

/// The derived task specification for one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputePlan {
    /// Task CPU units.
    pub cpu_units: u32,
    /// Task memory in MiB.
    pub memory_mib: u32,
    /// The single container definition.
    pub container: ContainerSpec,
    /// Volume bindings, one per storage plan.
    pub volume_bindings: Vec<VolumeBinding>,
}

/// Planner deriving the task specification from a descriptor and the
/// storage plans of the same run.
#[derive(Debug, Default)]
pub struct ComputePlanner;

/// Returns true if the (cpu, memory) pairing is in the supported table.
#[must_use]
pub fn is_supported_sizing(cpu_units: u32, memory_mib: u32) -> bool {
    SUPPORTED_TASK_SIZES
        .iter()
        .any(|(cpu, memories)| *cpu == cpu_units && memories.contains(&memory_mib))
}

impl ComputePlanner {
    /// Creates a new compute planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Derives the compute plan, binding one volume per storage plan at the
    /// descriptor's working directory.
    ///
    /// # Errors
    ///
    /// Returns an [`UnsupportedSizingError`], [`DuplicateKeyError`], or
    /// [`DanglingReferenceError`] when the corresponding invariant is
    /// violated.
    pub fn plan(
        &self,
        descriptor: &TopologyDescriptor,
        storage_plans: &[StoragePlan],
    ) -> Result<ComputePlan> {
        let bindings: Vec<VolumeBinding> = storage_plans
            .iter()
            .map(|storage| VolumeBinding {
                name: storage.volume_name.clone(),
                mount_path: descriptor.working_directory.clone(),
                read_only: VOLUME_READ_ONLY,
            })
            .collect();

        self.plan_with_bindings(descriptor, bindings, storage_plans)
    }

    /// Derives the compute plan with caller-supplied volume bindings.
    ///
    /// # Errors
    ///
    /// As [`ComputePlanner::plan`]; additionally rejects bindings that
    /// reference storage plans absent from `storage_plans`.
    pub fn plan_with_bindings(
        &self,
        descriptor: &TopologyDescriptor,
        bindings: Vec<VolumeBinding>,
        storage_plans: &[StoragePlan],
    ) -> Result<ComputePlan> {
        if !is_supported_sizing(descriptor.cpu_units, descriptor.memory_mib) {
            return Err(UnsupportedSizingError {
                field: String::from("cpu_units"),
                cpu_units: descriptor.cpu_units,
                memory_mib: descriptor.memory_mib,
            }
            .into());
        }

        Self::validate_bindings(&bindings, storage_plans)?;
        let env = Self::fold_environment(descriptor)?;

        let plan = ComputePlan {
            cpu_units: descriptor.cpu_units,
            memory_mib: descriptor.memory_mib,
            container: ContainerSpec {
                name: descriptor.app_name.clone(),
                image: descriptor.container_image.clone(),
                port: descriptor.container_port,
                working_directory: descriptor.working_directory.clone(),
                env,
                log_stream_prefix: descriptor.app_name.clone(),
            },
            volume_bindings: bindings,
        };

        debug!(
            "Derived compute plan: {} CPU / {} MiB, {} volume binding(s)",
            plan.cpu_units,
            plan.memory_mib,
            plan.volume_bindings.len()
        );
        Ok(plan)
    }

    /// Folds the ordered declaration list into a map, rejecting duplicates.
    fn fold_environment(descriptor: &TopologyDescriptor) -> Result<BTreeMap<String, String>> {
        let mut env = BTreeMap::new();

        for (i, var) in descriptor.environment_variables.iter().enumerate() {
            if env
                .insert(var.name.clone(), var.value.clone())
                .is_some()
            {
                return Err(DuplicateKeyError {
                    field: format!("environment_variables[{i}].name"),
                    key: var.name.clone(),
                }
                .into());
            }
        }

        Ok(env)
    }

    /// Rejects bindings that reference no storage plan from this run.
    fn validate_bindings(bindings: &[VolumeBinding], storage_plans: &[StoragePlan]) -> Result<()> {
        for (i, binding) in bindings.iter().enumerate() {
            if !storage_plans.iter().any(|s| s.volume_name == binding.name) {
                return Err(DanglingReferenceError {
                    field: format!("volume_bindings[{i}].name"),
                    binding: binding.name.clone(),
                    known: storage_plans.iter().map(|s| s.volume_name.clone()).collect(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl ComputePlan {
    /// Returns the environment value for a key, if declared.
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.container.env.get(key).map(String::as_str)
    }
}
