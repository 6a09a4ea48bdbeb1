//! Security planner: traffic intents to a deduplicated rule set.
//!
//! Produces one security group per application. The only rule the planner
//! synthesizes on its own is the self-referential NFS rule that lets tasks
//! in the group reach the shared filesystem without exposing the port
//! externally; every externally-facing rule must be declared by the caller
//! as a [`TrafficIntent`]. Identical intents deduplicate; intents that
//! assign contradictory directions to one (protocol, port, peer) tuple are
//! a construction error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::descriptor::{CidrBlock, TopologyDescriptor};
use crate::error::{PolicyConflictError, Result};

/// NFS port opened within the group for shared-filesystem access.
pub const NFS_PORT: u16 = 2049;

/// Traffic direction of a rule or intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic arriving at group members.
    Ingress,
    /// Traffic leaving group members.
    Egress,
}

/// Transport protocol of a rule or intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP protocol.
    Tcp,
    /// UDP protocol.
    Udp,
}

/// The peer a rule applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Peer {
    /// The security group itself; grants intra-group access without
    /// exposing the port externally.
    SelfGroup,
    /// Any IPv4 address.
    AnyIpv4,
    /// A specific CIDR block.
    Cidr(CidrBlock),
}

/// A declared traffic intent, supplied by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrafficIntent {
    /// Direction of the intended traffic.
    pub direction: Direction,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Port the intent applies to.
    pub port: u16,
    /// Peer the intent applies to.
    pub peer: Peer,
}

/// A single resolved security rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecurityRule {
    /// Direction of the rule.
    pub direction: Direction,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Port the rule applies to.
    pub port: u16,
    /// Peer the rule applies to.
    pub peer: Peer,
}

/// The derived security group for one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityPlan {
    /// Security group name, shared by the service and the filesystem.
    pub group_name: String,
    /// Deduplicated rules in a stable order.
    pub rules: Vec<SecurityRule>,
}

/// Planner deriving the security group from declared intents.
#[derive(Debug, Default)]
pub struct SecurityPlanner;

impl TrafficIntent {
    /// Creates a self-referential ingress intent (peer = the group itself).
    #[must_use]
    pub const fn self_referential(protocol: Protocol, port: u16) -> Self {
        Self {
            direction: Direction::Ingress,
            protocol,
            port,
            peer: Peer::SelfGroup,
        }
    }

    /// Creates an ingress intent open to any IPv4 peer.
    #[must_use]
    pub const fn public_ingress(protocol: Protocol, port: u16) -> Self {
        Self {
            direction: Direction::Ingress,
            protocol,
            port,
            peer: Peer::AnyIpv4,
        }
    }
}

impl SecurityPlanner {
    /// Creates a new security planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Derives the security plan from the descriptor and declared intents.
    ///
    /// The self-referential NFS rule is always synthesized; it is the only
    /// rule not originating from `intents`.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyConflictError`] when two intents assign
    /// contradictory directions to the same (protocol, port, peer) tuple.
    pub fn plan(
        &self,
        descriptor: &TopologyDescriptor,
        intents: &[TrafficIntent],
    ) -> Result<SecurityPlan> {
        let synthesized = TrafficIntent::self_referential(Protocol::Tcp, NFS_PORT);

        let mut directions: BTreeMap<(Protocol, u16, Peer), Direction> = BTreeMap::new();
        let mut rules: BTreeSet<SecurityRule> = BTreeSet::new();

        for (index, intent) in std::iter::once(&synthesized)
            .chain(intents.iter())
            .enumerate()
        {
            let tuple = (intent.protocol, intent.port, intent.peer);
            if let Some(existing) = directions.get(&tuple)
                && *existing != intent.direction
            {
                // Index 0 is the synthesized rule; declared intents follow.
                return Err(PolicyConflictError {
                    field: format!("traffic_intents[{}]", index.saturating_sub(1)),
                    protocol: intent.protocol.to_string(),
                    port: intent.port,
                    peer: intent.peer.to_string(),
                }
                .into());
            }
            directions.insert(tuple, intent.direction);

            rules.insert(SecurityRule {
                direction: intent.direction,
                protocol: intent.protocol,
                port: intent.port,
                peer: intent.peer,
            });
        }

        let plan = SecurityPlan {
            group_name: descriptor.security_group_name(),
            rules: rules.into_iter().collect(),
        };

        debug!(
            "Derived security group '{}' with {} rules",
            plan.group_name,
            plan.rules.len()
        );
        Ok(plan)
    }
}

impl SecurityPlan {
    /// Returns the rules with the given direction.
    #[must_use]
    pub fn rules_in(&self, direction: Direction) -> Vec<&SecurityRule> {
        self.rules
            .iter()
            .filter(|r| r.direction == direction)
            .collect()
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfGroup => write!(f, "self"),
            Self::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Self::Cidr(cidr) => write!(f, "{cidr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlanningError, TopoplanError};
    use crate::planner::fixtures::gitness_descriptor as descriptor;

    #[test]
    fn test_synthesizes_only_the_nfs_self_rule() {
        let plan = SecurityPlanner::new().plan(&descriptor(), &[]).unwrap();
        assert_eq!(plan.group_name, "gitness-dev-web");
        assert_eq!(plan.rules.len(), 1);
        assert_eq!(
            plan.rules[0],
            SecurityRule {
                direction: Direction::Ingress,
                protocol: Protocol::Tcp,
                port: NFS_PORT,
                peer: Peer::SelfGroup,
            }
        );
    }

    #[test]
    fn test_declared_intents_become_rules() {
        let intents = [TrafficIntent::public_ingress(Protocol::Tcp, 80)];
        let plan = SecurityPlanner::new().plan(&descriptor(), &intents).unwrap();
        assert_eq!(plan.rules.len(), 2);
        assert_eq!(plan.rules_in(Direction::Ingress).len(), 2);
    }

    #[test]
    fn test_idempotent_under_replanning() {
        let intents = [
            TrafficIntent::public_ingress(Protocol::Tcp, 80),
            TrafficIntent::public_ingress(Protocol::Tcp, 80),
            TrafficIntent::self_referential(Protocol::Tcp, NFS_PORT),
        ];
        let planner = SecurityPlanner::new();
        let first = planner.plan(&descriptor(), &intents).unwrap();
        let second = planner.plan(&descriptor(), &intents).unwrap();

        // Duplicates collapse and re-planning is stable.
        assert_eq!(first.rules.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_contradictory_directions_conflict() {
        let intents = [
            TrafficIntent {
                direction: Direction::Ingress,
                protocol: Protocol::Tcp,
                port: 80,
                peer: Peer::AnyIpv4,
            },
            TrafficIntent {
                direction: Direction::Egress,
                protocol: Protocol::Tcp,
                port: 80,
                peer: Peer::AnyIpv4,
            },
        ];
        let err = SecurityPlanner::new()
            .plan(&descriptor(), &intents)
            .unwrap_err();
        match err {
            TopoplanError::Planning(PlanningError::PolicyConflict(conflict)) => {
                assert_eq!(conflict.port, 80);
                assert_eq!(conflict.field, "traffic_intents[1]");
            }
            other => panic!("expected PolicyConflictError, got {other}"),
        }
    }

    #[test]
    fn test_conflict_with_synthesized_rule() {
        let intents = [TrafficIntent {
            direction: Direction::Egress,
            protocol: Protocol::Tcp,
            port: NFS_PORT,
            peer: Peer::SelfGroup,
        }];
        let err = SecurityPlanner::new()
            .plan(&descriptor(), &intents)
            .unwrap_err();
        assert!(matches!(
            err,
            TopoplanError::Planning(PlanningError::PolicyConflict(_))
        ));
    }

    #[test]
    fn test_cidr_peer_rules() {
        let office: CidrBlock = "10.8.0.0/16".parse().unwrap();
        let intents = [TrafficIntent {
            direction: Direction::Ingress,
            protocol: Protocol::Tcp,
            port: 443,
            peer: Peer::Cidr(office),
        }];
        let plan = SecurityPlanner::new().plan(&descriptor(), &intents).unwrap();
        assert!(plan.rules.iter().any(|r| r.peer == Peer::Cidr(office)));
    }
}
