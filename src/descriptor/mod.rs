//! Topology descriptor module for the Topoplan planning system.
//!
//! This module handles everything about the planner's input model:
//! - Parsing and deserializing `topoplan.topology.yaml`
//! - Structural validation of descriptor values
//! - Computing descriptor hashes for plan fingerprinting

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{CidrBlock, EnvVar, StorageIdentityConfig, TopologyDescriptor};
pub use parser::DescriptorParser;
pub use validator::{DescriptorValidator, ValidationError, ValidationResult};
pub use hash::DescriptorHasher;
