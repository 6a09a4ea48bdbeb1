//! Planning module for topology derivation.
//!
//! The five planners run in a strictly linear, acyclic order — network,
//! then security and storage, then compute, then service — each a pure
//! function of the descriptor and the plans before it. `graph` assembles
//! the fragments into the resource graph handed to a provisioning backend.

mod network;
mod security;
mod storage;
mod compute;
mod service;
mod graph;

pub use network::{
    AccessClass, NetworkPlan, NetworkPlanner, SubnetPlan, TierSpec, SUBNET_PREFIX_LEN,
};
pub use security::{
    Direction, Peer, Protocol, SecurityPlan, SecurityPlanner, SecurityRule, TrafficIntent,
    NFS_PORT,
};
pub use storage::{AccessPointAcl, AuthorizationMode, PosixIdentity, StoragePlan, StoragePlanner};
pub use compute::{
    is_supported_sizing, ComputePlan, ComputePlanner, ContainerSpec, VolumeBinding,
};
pub use service::{
    HealthSignal, LoadBalancerSpec, RolloutPolicy, RolloutState, RolloutTracker, ServicePlan,
    ServicePlanner, DEFAULT_DESIRED_COUNT, DEFAULT_MAX_HEALTH_CHECKS,
};
pub use graph::{ApplyStep, ResourceGraph, TopologyPlanner, APPLY_ORDER};
