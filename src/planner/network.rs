//! Network planner: VPC block and tiered subnet derivation.
//!
//! Derives a three-tier subnet layout (public, application-private,
//! data-isolated) replicated across the declared number of availability
//! zones. The layout is a pure function of the descriptor: fixed /20 per
//! tier per AZ, carved out of the base block in ascending network order,
//! tier-major then AZ-minor, so downstream planners and backends can address
//! specific subnets reproducibly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{CidrBlock, TopologyDescriptor};
use crate::error::{CapacityError, Result};

/// Fixed prefix length for every subnet, regardless of tier or AZ.
pub const SUBNET_PREFIX_LEN: u8 = 20;

/// The closed tier policy: name suffix and access class, in layout order.
const TIER_POLICY: &[(&str, AccessClass)] = &[
    ("public", AccessClass::Public),
    ("application", AccessClass::PrivateWithEgress),
    ("data", AccessClass::Isolated),
];

/// Subnet classification by network reachability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AccessClass {
    /// Internet-routable in both directions.
    Public,
    /// Outbound egress only; no inbound route from the internet.
    PrivateWithEgress,
    /// Fully isolated; no route to or from the internet.
    Isolated,
}

/// One tier of the subnet layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierSpec {
    /// Tier name, prefixed with the application name.
    pub name: String,
    /// Prefix length of every subnet in this tier.
    pub cidr_mask: u8,
    /// Reachability class of this tier.
    pub access_class: AccessClass,
}

/// A single subnet in one tier and one AZ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubnetPlan {
    /// Subnet name: `{app}-{tier}-{az_index}`.
    pub name: String,
    /// Reachability class inherited from the tier.
    pub access_class: AccessClass,
    /// Zero-based availability zone index.
    pub az_index: u8,
    /// CIDR block assigned to this subnet.
    pub cidr: CidrBlock,
}

/// The derived network layout for one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkPlan {
    /// Base CIDR block the subnets are carved from.
    pub cidr_block: CidrBlock,
    /// Number of availability zones spanned.
    pub az_count: u8,
    /// The three tiers, in layout order.
    pub tiers: Vec<TierSpec>,
    /// All subnets, tier-major then AZ-minor.
    pub subnets: Vec<SubnetPlan>,
}

/// Planner deriving the network layout from a descriptor.
#[derive(Debug, Default)]
pub struct NetworkPlanner;

impl NetworkPlanner {
    /// Creates a new network planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Derives the network plan for the given descriptor.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `az_count` is 0 and a
    /// [`CapacityError`] when `3 x az_count` /20 subnets do not fit into
    /// the declared base block.
    pub fn plan(&self, descriptor: &TopologyDescriptor) -> Result<NetworkPlan> {
        // Checked by the descriptor validator too, but this planner is
        // public on its own and an empty layout must never come back as
        // a success.
        if descriptor.az_count == 0 {
            return Err(crate::error::DescriptorError::validation(
                "az_count",
                "At least one availability zone is required",
            )
            .into());
        }

        let tier_count = TIER_POLICY.len() as u32;
        let az_count = u32::from(descriptor.az_count);
        let required = tier_count * az_count;
        let available = descriptor.cidr_block.sub_block_count(SUBNET_PREFIX_LEN);

        if required > available {
            return Err(CapacityError {
                field: String::from("az_count"),
                cidr_block: descriptor.cidr_block.to_string(),
                tiers: tier_count,
                az_count,
                required,
                available,
                subnet_mask: SUBNET_PREFIX_LEN,
            }
            .into());
        }

        let tiers: Vec<TierSpec> = TIER_POLICY
            .iter()
            .map(|(suffix, access_class)| TierSpec {
                name: format!("{}-{suffix}", descriptor.app_name),
                cidr_mask: SUBNET_PREFIX_LEN,
                access_class: *access_class,
            })
            .collect();

        let mut subnets = Vec::with_capacity(required as usize);
        for (tier_index, tier) in tiers.iter().enumerate() {
            for az_index in 0..descriptor.az_count {
                let block_index = tier_index as u32 * az_count + u32::from(az_index);
                // Guarded by the capacity check above.
                let cidr = descriptor
                    .cidr_block
                    .sub_block(SUBNET_PREFIX_LEN, block_index)
                    .ok_or_else(|| {
                        crate::error::TopoplanError::internal(format!(
                            "subnet index {block_index} out of range for {}",
                            descriptor.cidr_block
                        ))
                    })?;

                subnets.push(SubnetPlan {
                    name: format!("{}-{az_index}", tier.name),
                    access_class: tier.access_class,
                    az_index,
                    cidr,
                });
            }
        }

        debug!(
            "Derived {} subnets across {} AZs from {}",
            subnets.len(),
            descriptor.az_count,
            descriptor.cidr_block
        );

        Ok(NetworkPlan {
            cidr_block: descriptor.cidr_block,
            az_count: descriptor.az_count,
            tiers,
            subnets,
        })
    }
}

impl NetworkPlan {
    /// Returns the subnets belonging to the given access class, in AZ order.
    #[must_use]
    pub fn subnets_in(&self, access_class: AccessClass) -> Vec<&SubnetPlan> {
        self.subnets
            .iter()
            .filter(|s| s.access_class == access_class)
            .collect()
    }

    /// Returns the total number of subnets.
    #[must_use]
    pub const fn subnet_count(&self) -> usize {
        self.subnets.len()
    }
}

impl std::fmt::Display for AccessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::PrivateWithEgress => "private-with-egress",
            Self::Isolated => "isolated",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlanningError, TopoplanError};
    use crate::planner::fixtures::gitness_descriptor;

    fn descriptor(az_count: u8) -> TopologyDescriptor {
        let mut desc = gitness_descriptor();
        desc.az_count = az_count;
        desc
    }

    #[test]
    fn test_three_tiers_always() {
        let plan = NetworkPlanner::new().plan(&descriptor(3)).unwrap();
        assert_eq!(plan.tiers.len(), 3);
        assert_eq!(plan.tiers[0].name, "gitness-public");
        assert_eq!(plan.tiers[1].name, "gitness-application");
        assert_eq!(plan.tiers[2].name, "gitness-data");
        assert_eq!(plan.tiers[0].access_class, AccessClass::Public);
        assert_eq!(plan.tiers[1].access_class, AccessClass::PrivateWithEgress);
        assert_eq!(plan.tiers[2].access_class, AccessClass::Isolated);
    }

    #[test]
    fn test_subnet_count_and_partition_for_all_valid_az_counts() {
        for az_count in 1..=5_u8 {
            let desc = descriptor(az_count);
            let plan = NetworkPlanner::new().plan(&desc).unwrap();

            assert_eq!(plan.subnet_count(), 3 * az_count as usize);

            for subnet in &plan.subnets {
                assert!(desc.cidr_block.contains(&subnet.cidr));
                assert_eq!(subnet.cidr.prefix_len, SUBNET_PREFIX_LEN);
            }

            for (i, a) in plan.subnets.iter().enumerate() {
                for b in plan.subnets.iter().skip(i + 1) {
                    assert!(
                        !a.cidr.overlaps_with(&b.cidr),
                        "{} overlaps {}",
                        a.cidr,
                        b.cidr
                    );
                }
            }
        }
    }

    #[test]
    fn test_deterministic_tier_major_order() {
        let plan = NetworkPlanner::new().plan(&descriptor(3)).unwrap();

        let names: Vec<&str> = plan.subnets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "gitness-public-0",
                "gitness-public-1",
                "gitness-public-2",
                "gitness-application-0",
                "gitness-application-1",
                "gitness-application-2",
                "gitness-data-0",
                "gitness-data-1",
                "gitness-data-2",
            ]
        );

        // First public subnet starts at the base block.
        assert_eq!(plan.subnets[0].cidr.to_string(), "172.32.0.0/20");
        // Re-planning yields byte-identical output.
        let again = NetworkPlanner::new().plan(&descriptor(3)).unwrap();
        assert_eq!(plan, again);
    }

    #[test]
    fn test_zero_az_count_rejected() {
        let err = NetworkPlanner::new().plan(&descriptor(0)).unwrap_err();
        assert_eq!(err.field_path(), Some("az_count"));
        assert!(matches!(err, TopoplanError::Descriptor(_)), "got {err}");
    }

    #[test]
    fn test_capacity_error_when_block_too_small() {
        // A /16 holds 16 /20s; 6 AZs would need 18.
        let mut desc = descriptor(6);
        desc.az_count = 6;
        let err = NetworkPlanner::new().plan(&desc).unwrap_err();
        match err {
            TopoplanError::Planning(PlanningError::Capacity(capacity)) => {
                assert_eq!(capacity.required, 18);
                assert_eq!(capacity.available, 16);
                assert_eq!(capacity.field, "az_count");
            }
            other => panic!("expected CapacityError, got {other}"),
        }
    }

    #[test]
    fn test_subnets_in_access_class() {
        let plan = NetworkPlanner::new().plan(&descriptor(2)).unwrap();
        let isolated = plan.subnets_in(AccessClass::Isolated);
        assert_eq!(isolated.len(), 2);
        assert!(isolated.iter().all(|s| s.name.starts_with("gitness-data")));
    }
}
