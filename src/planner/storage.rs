//! Storage planner: shared filesystem, access point, and identity mapping.
//!
//! Derives exactly one shared-filesystem resource and one access point bound
//! to the application's working directory. The access point enforces the
//! POSIX identity and ACL permission mask from the descriptor; the planner
//! treats uid/gid values as opaque and only enforces the structural
//! invariant that the ACL owner identity equals the POSIX identity. Transit
//! encryption and IAM authorization are always enabled; that is a fixed
//! least-privilege policy, not configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::TopologyDescriptor;
use crate::error::{IdentityMismatchError, Result};

/// POSIX identity enforced by the access point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PosixIdentity {
    /// Enforced uid.
    pub uid: u32,
    /// Enforced gid.
    pub gid: u32,
}

/// ACL applied when the access-point root directory is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessPointAcl {
    /// Owner uid of the root directory.
    pub owner_uid: u32,
    /// Owner gid of the root directory.
    pub owner_gid: u32,
    /// Octal permission mask (e.g., 755).
    pub permissions: u16,
}

/// How clients authorize against the filesystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationMode {
    /// IAM-based authorization. The only mode this planner emits.
    Iam,
}

/// The derived shared-storage resources for one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoragePlan {
    /// Volume name used by compute bindings to reference this plan.
    pub volume_name: String,
    /// Opaque filesystem handle; left unresolved at planning time and
    /// filled in by the provisioning backend.
    pub filesystem_id: Option<String>,
    /// Path the access point is bound to.
    pub access_point_path: String,
    /// POSIX identity the access point enforces.
    pub posix_identity: PosixIdentity,
    /// ACL for the access-point root directory.
    pub acl: AccessPointAcl,
    /// Always true.
    pub transit_encryption: bool,
    /// Always [`AuthorizationMode::Iam`].
    pub authorization_mode: AuthorizationMode,
}

/// Planner deriving the storage resources from a descriptor.
#[derive(Debug, Default)]
pub struct StoragePlanner;

impl StoragePlanner {
    /// Creates a new storage planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Derives the storage plan for the given descriptor.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityMismatchError`] when the descriptor's ACL owner
    /// identity diverges from its POSIX identity.
    pub fn plan(&self, descriptor: &TopologyDescriptor) -> Result<StoragePlan> {
        let identity = &descriptor.storage_identity;
        let acl_owner_uid = identity.effective_acl_owner_uid();
        let acl_owner_gid = identity.effective_acl_owner_gid();

        if acl_owner_uid != identity.uid || acl_owner_gid != identity.gid {
            return Err(IdentityMismatchError {
                field: String::from("storage_identity"),
                acl_owner_uid,
                acl_owner_gid,
                posix_uid: identity.uid,
                posix_gid: identity.gid,
            }
            .into());
        }

        let plan = StoragePlan {
            volume_name: descriptor.volume_name.clone(),
            filesystem_id: None,
            access_point_path: descriptor.working_directory.clone(),
            posix_identity: PosixIdentity {
                uid: identity.uid,
                gid: identity.gid,
            },
            acl: AccessPointAcl {
                owner_uid: acl_owner_uid,
                owner_gid: acl_owner_gid,
                permissions: identity.permissions,
            },
            transit_encryption: true,
            authorization_mode: AuthorizationMode::Iam,
        };

        debug!(
            "Derived storage plan: volume '{}' at '{}' for {}:{}",
            plan.volume_name, plan.access_point_path, identity.uid, identity.gid
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlanningError, TopoplanError};
    use crate::planner::fixtures::gitness_descriptor;

    #[test]
    fn test_storage_plan_defaults() {
        let plan = StoragePlanner::new().plan(&gitness_descriptor()).unwrap();

        assert_eq!(plan.volume_name, "data");
        assert!(plan.filesystem_id.is_none());
        assert_eq!(plan.access_point_path, "/data");
        assert_eq!(plan.posix_identity, PosixIdentity { uid: 1000, gid: 1000 });
        assert_eq!(plan.acl.permissions, 755);
        assert!(plan.transit_encryption);
        assert_eq!(plan.authorization_mode, AuthorizationMode::Iam);
    }

    #[test]
    fn test_acl_owner_equals_posix_identity() {
        let plan = StoragePlanner::new().plan(&gitness_descriptor()).unwrap();
        assert_eq!(plan.acl.owner_uid, plan.posix_identity.uid);
        assert_eq!(plan.acl.owner_gid, plan.posix_identity.gid);
    }

    #[test]
    fn test_identity_mismatch_rejected() {
        let mut desc = gitness_descriptor();
        desc.storage_identity.acl_owner_uid = Some(0);

        let err = StoragePlanner::new().plan(&desc).unwrap_err();
        match err {
            TopoplanError::Planning(PlanningError::IdentityMismatch(mismatch)) => {
                assert_eq!(mismatch.acl_owner_uid, 0);
                assert_eq!(mismatch.posix_uid, 1000);
                assert_eq!(mismatch.field, "storage_identity");
            }
            other => panic!("expected IdentityMismatchError, got {other}"),
        }
    }

    #[test]
    fn test_identity_mismatch_on_gid_too() {
        let mut desc = gitness_descriptor();
        desc.storage_identity.acl_owner_gid = Some(33);
        assert!(StoragePlanner::new().plan(&desc).is_err());
    }

    #[test]
    fn test_mismatch_for_various_identity_pairs() {
        for (uid, gid, owner_uid, owner_gid, ok) in [
            (1000, 1000, 1000, 1000, true),
            (0, 0, 0, 0, true),
            (1000, 1000, 0, 1000, false),
            (1000, 1000, 1000, 0, false),
            (501, 20, 502, 20, false),
        ] {
            let mut desc = gitness_descriptor();
            desc.storage_identity.uid = uid;
            desc.storage_identity.gid = gid;
            desc.storage_identity.acl_owner_uid = Some(owner_uid);
            desc.storage_identity.acl_owner_gid = Some(owner_gid);

            let result = StoragePlanner::new().plan(&desc);
            assert_eq!(result.is_ok(), ok, "uid={uid} gid={gid}");
        }
    }

    #[test]
    fn test_custom_mount_path() {
        let mut desc = gitness_descriptor();
        desc.working_directory = String::from("/srv/state");
        let plan = StoragePlanner::new().plan(&desc).unwrap();
        assert_eq!(plan.access_point_path, "/srv/state");
    }
}
