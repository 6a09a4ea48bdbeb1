// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Topoplan
//!
//! A declarative, invariant-preserving infrastructure topology planner for
//! containerized web applications.
//!
//! ## Overview
//!
//! Topoplan takes an abstract description of one containerized web
//! application — network shape, one persistent shared volume, one
//! long-running container, one public entry point — and derives a
//! consistent, dependency-ordered resource graph:
//!
//! - A three-tier subnet layout (public / application-private /
//!   data-isolated) replicated across availability zones
//! - A single security group whose rule set is derived from declared
//!   traffic intents
//! - A shared filesystem with an identity-enforcing access point
//! - A task specification for the container, validated against a closed
//!   sizing table
//! - A load-balanced service with a circuit-breaker rollback policy
//!
//! Planning is a pure, synchronous function of the topology descriptor: no
//! cloud state is read, no I/O is performed, and every failure is a
//! construction-time error naming the offending field. Actually creating
//! resources is delegated to a [`ProvisioningBackend`] collaborator, which
//! receives the fully resolved graph plus an ordered apply plan.
//!
//! ## Modules
//!
//! - [`descriptor`]: Topology descriptor parsing, validation, and hashing
//! - [`planner`]: The five planners and resource graph assembly
//! - [`backend`]: The provisioning backend seam and graph applier
//!
//! ## Example
//!
//! ```
//! use topoplan::{DescriptorParser, TopologyPlanner};
//!
//! let yaml = r"
//! app_name: gitness
//! container_image: harness/gitness
//! container_port: 3000
//! storage_identity:
//!   uid: 1000
//!   gid: 1000
//!   permissions: 755
//! cpu_units: 256
//! memory_mib: 512
//! az_count: 3
//! cidr_block: 172.32.0.0/16
//! ";
//!
//! let descriptor = DescriptorParser::new().parse_yaml(yaml, None)?;
//! let graph = TopologyPlanner::new().plan(&descriptor)?;
//! assert_eq!(graph.network.subnet_count(), 9);
//! # Ok::<(), topoplan::TopoplanError>(())
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backend;
pub mod descriptor;
pub mod error;
pub mod planner;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{ApplyOutcome, GraphApplier, InMemoryBackend, ProvisionedResources, ProvisioningBackend};
pub use descriptor::{
    CidrBlock, DescriptorHasher, DescriptorParser, DescriptorValidator, EnvVar,
    StorageIdentityConfig, TopologyDescriptor,
};
pub use error::{PlanningError, Result, TopoplanError};
pub use planner::{
    ComputePlan, ComputePlanner, NetworkPlan, NetworkPlanner, ResourceGraph, RolloutState,
    RolloutTracker, SecurityPlan, SecurityPlanner, ServicePlan, ServicePlanner, StoragePlan,
    StoragePlanner, TopologyPlanner, TrafficIntent,
};
