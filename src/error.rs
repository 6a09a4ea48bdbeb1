//! Error types for the Topoplan planning system.
//!
//! This module provides the error hierarchy for the whole planning lifecycle:
//! descriptor parsing and validation, the five planners, the rollout state
//! machine, and the apply phase driven against a provisioning backend.
//!
//! Planning errors are construction-time, synchronous, and non-retryable: a
//! planning failure means the descriptor or a policy table is inconsistent
//! and must be corrected by the caller. No partial plan is ever returned.
//! Every planning error names the offending field path.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Topoplan planning system.
#[derive(Debug, Error)]
pub enum TopoplanError {
    /// Descriptor loading or validation errors.
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    /// Rollout state machine errors.
    #[error("Rollout error: {0}")]
    Rollout(#[from] RolloutError),

    /// Apply-phase errors reported by the provisioning backend.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Descriptor loading and validation errors.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor file was not found.
    #[error("Descriptor file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The descriptor file could not be parsed.
    #[error("Failed to parse descriptor: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Structural validation failed.
    #[error("Descriptor validation failed at {field}: {message}")]
    ValidationError {
        /// Field path that failed validation.
        field: String,
        /// Description of the validation error.
        message: String,
    },
}

/// Planning errors produced by the planner pipeline.
///
/// All variants are all-or-nothing construction failures; none is retryable.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The subnet/AZ math is infeasible for the declared CIDR block.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// Two declared traffic intents contradict each other.
    #[error(transparent)]
    PolicyConflict(#[from] PolicyConflictError),

    /// Storage ACL owner identity diverges from the POSIX identity.
    #[error(transparent)]
    IdentityMismatch(#[from] IdentityMismatchError),

    /// The requested (cpu, memory) pairing is not in the supported table.
    #[error(transparent)]
    UnsupportedSizing(#[from] UnsupportedSizingError),

    /// A volume binding references a storage plan that does not exist.
    #[error(transparent)]
    DanglingReference(#[from] DanglingReferenceError),

    /// An environment map key is declared more than once.
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),
}

/// Subnet capacity is infeasible for the declared CIDR block.
#[derive(Debug, Error)]
#[error(
    "{field}: {required} /{subnet_mask} subnets required ({tiers} tiers x {az_count} AZs) \
     but only {available} fit in {cidr_block}"
)]
pub struct CapacityError {
    /// Field path of the offending input.
    pub field: String,
    /// The declared CIDR block.
    pub cidr_block: String,
    /// Number of tiers replicated per AZ.
    pub tiers: u32,
    /// Number of availability zones requested.
    pub az_count: u32,
    /// Subnets required in total.
    pub required: u32,
    /// Subnets available in the block.
    pub available: u32,
    /// Fixed per-subnet mask size.
    pub subnet_mask: u8,
}

/// Two declared traffic intents assign contradictory directions to the same
/// (protocol, port, peer) tuple.
#[derive(Debug, Error)]
#[error("{field}: contradictory directions for {protocol} port {port} peer {peer}")]
pub struct PolicyConflictError {
    /// Field path of the offending intent.
    pub field: String,
    /// Protocol of the conflicting tuple.
    pub protocol: String,
    /// Port of the conflicting tuple.
    pub port: u16,
    /// Peer of the conflicting tuple.
    pub peer: String,
}

/// Storage ACL owner identity diverges from the declared POSIX identity.
#[derive(Debug, Error)]
#[error(
    "{field}: ACL owner {acl_owner_uid}:{acl_owner_gid} does not match \
     POSIX identity {posix_uid}:{posix_gid}"
)]
pub struct IdentityMismatchError {
    /// Field path of the offending identity.
    pub field: String,
    /// Declared ACL owner uid.
    pub acl_owner_uid: u32,
    /// Declared ACL owner gid.
    pub acl_owner_gid: u32,
    /// Declared POSIX uid.
    pub posix_uid: u32,
    /// Declared POSIX gid.
    pub posix_gid: u32,
}

/// The requested (cpu, memory) pairing is not in the supported sizing table.
#[derive(Debug, Error)]
#[error("{field}: unsupported task sizing {cpu_units} CPU units / {memory_mib} MiB")]
pub struct UnsupportedSizingError {
    /// Field path of the offending sizing.
    pub field: String,
    /// Requested CPU units.
    pub cpu_units: u32,
    /// Requested memory in MiB.
    pub memory_mib: u32,
}

/// A volume binding references a storage plan absent from the same run.
#[derive(Debug, Error)]
#[error("{field}: volume binding '{binding}' references no storage plan (known: {known:?})")]
pub struct DanglingReferenceError {
    /// Field path of the offending binding.
    pub field: String,
    /// Name the binding references.
    pub binding: String,
    /// Storage plan names present in this run.
    pub known: Vec<String>,
}

/// An environment map key is declared more than once.
#[derive(Debug, Error)]
#[error("{field}: duplicate environment key '{key}'")]
pub struct DuplicateKeyError {
    /// Field path of the offending entry.
    pub field: String,
    /// The duplicated key.
    pub key: String,
}

/// Rollout state machine errors.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// An event was applied in a state that does not accept it.
    #[error("Invalid rollout transition: {event} in state {state}")]
    InvalidTransition {
        /// Current state of the rollout.
        state: String,
        /// Event that was rejected.
        event: String,
    },
}

/// Apply-phase errors reported while driving a provisioning backend.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The backend failed to create a resource.
    #[error("Backend failed to create {resource_type} '{name}': {reason}")]
    ResourceCreateFailed {
        /// Type of resource being created.
        resource_type: String,
        /// Name of the resource.
        name: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A health probe against the backend failed.
    #[error("Health probe failed for service '{service}': {reason}")]
    HealthProbeFailed {
        /// Service being probed.
        service: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The automatic rollback itself failed.
    #[error("Rollback failed for service '{service}': {reason}")]
    RollbackFailed {
        /// Service being rolled back.
        service: String,
        /// Reason for the failure.
        reason: String,
    },
}

/// Result type alias for Topoplan operations.
pub type Result<T> = std::result::Result<T, TopoplanError>;

impl TopoplanError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the offending field path, if this error carries one.
    #[must_use]
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Self::Descriptor(DescriptorError::ValidationError { field, .. })
            | Self::Planning(
                PlanningError::Capacity(CapacityError { field, .. })
                | PlanningError::PolicyConflict(PolicyConflictError { field, .. })
                | PlanningError::IdentityMismatch(IdentityMismatchError { field, .. })
                | PlanningError::UnsupportedSizing(UnsupportedSizingError { field, .. })
                | PlanningError::DanglingReference(DanglingReferenceError { field, .. })
                | PlanningError::DuplicateKey(DuplicateKeyError { field, .. }),
            ) => Some(field),
            _ => None,
        }
    }
}

impl DescriptorError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ApplyError {
    /// Creates a resource creation error.
    #[must_use]
    pub fn create_failed(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ResourceCreateFailed {
            resource_type: resource_type.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// Planning sub-errors arrive wrapped in `PlanningError`; let them convert
// straight to the top-level error as well.
macro_rules! planning_from {
    ($($err:ident),+ $(,)?) => {
        $(impl From<$err> for TopoplanError {
            fn from(e: $err) -> Self {
                Self::Planning(PlanningError::from(e))
            }
        })+
    };
}

planning_from!(
    CapacityError,
    PolicyConflictError,
    IdentityMismatchError,
    UnsupportedSizingError,
    DanglingReferenceError,
    DuplicateKeyError,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_for_planning_errors() {
        let err = TopoplanError::from(DuplicateKeyError {
            field: String::from("environment.DB_URL"),
            key: String::from("DB_URL"),
        });
        assert_eq!(err.field_path(), Some("environment.DB_URL"));
    }

    #[test]
    fn test_field_path_absent_for_io() {
        let err = TopoplanError::Io(std::io::Error::other("boom"));
        assert!(err.field_path().is_none());
    }

    #[test]
    fn test_capacity_error_message() {
        let err = CapacityError {
            field: String::from("az_count"),
            cidr_block: String::from("10.0.0.0/20"),
            tiers: 3,
            az_count: 3,
            required: 9,
            available: 1,
            subnet_mask: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("az_count"));
        assert!(msg.contains("9 /20 subnets"));
    }
}
