//! Topology descriptor types for the planning system.
//!
//! This module defines the structs that map to the `topoplan.topology.yaml`
//! file. The descriptor fully describes one containerized web application:
//! network shape, one persistent shared volume, one long-running container,
//! and one public entry point. It is immutable once constructed; every
//! planner reads it and none mutates it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// The root descriptor for a single topology planning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyDescriptor {
    /// Unique application name (lowercase alphanumeric with hyphens).
    pub app_name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Container image reference.
    pub container_image: String,
    /// Port the container listens on.
    pub container_port: u16,
    /// Working directory inside the container; also the shared-volume mount
    /// path and the storage access-point path.
    #[serde(default = "default_working_directory")]
    pub working_directory: String,
    /// Environment variables, in declaration order.
    ///
    /// Carried as a list rather than a map so that duplicate keys survive
    /// parsing and can be rejected during compute planning.
    #[serde(default)]
    pub environment_variables: Vec<EnvVar>,
    /// POSIX identity enforced on the shared volume.
    pub storage_identity: StorageIdentityConfig,
    /// Task CPU units.
    pub cpu_units: u32,
    /// Task memory in MiB.
    pub memory_mib: u32,
    /// Number of availability zones to span.
    pub az_count: u8,
    /// Base CIDR block for the network (must be a /16 or larger).
    pub cidr_block: CidrBlock,
    /// Public listener port on the load balancer.
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,
    /// Name of the shared volume.
    #[serde(default = "default_volume_name")]
    pub volume_name: String,
}

/// A single environment variable declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value. Opaque to the planner; values such as deployed
    /// hostnames are caller-supplied, never derived.
    pub value: String,
}

/// POSIX identity and ACL configuration for the shared volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageIdentityConfig {
    /// POSIX uid the access point enforces.
    pub uid: u32,
    /// POSIX gid the access point enforces.
    pub gid: u32,
    /// Octal permission mask for the access-point root (e.g., 755).
    pub permissions: u16,
    /// ACL owner uid; defaults to `uid` when omitted.
    #[serde(default)]
    pub acl_owner_uid: Option<u32>,
    /// ACL owner gid; defaults to `gid` when omitted.
    #[serde(default)]
    pub acl_owner_gid: Option<u32>,
}

/// An IPv4 CIDR block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock {
    /// Network address (host bits zeroed).
    pub network: Ipv4Addr,
    /// Prefix length in bits.
    pub prefix_len: u8,
}

// Default value functions

fn default_environment() -> String {
    String::from("dev")
}

fn default_working_directory() -> String {
    String::from("/data")
}

const fn default_listener_port() -> u16 {
    80
}

fn default_volume_name() -> String {
    String::from("data")
}

// CIDR block parsing and arithmetic

impl TryFrom<String> for CidrBlock {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CidrBlock> for String {
    fn from(cidr: CidrBlock) -> Self {
        cidr.to_string()
    }
}

impl FromStr for CidrBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| format!("Invalid CIDR format: {s}. Expected format: A.B.C.D/LEN"))?;

        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| format!("Invalid IPv4 address: {addr}"))?;

        let prefix_len = len
            .parse::<u8>()
            .map_err(|_| format!("Invalid prefix length: {len}"))?;
        if prefix_len > 32 {
            return Err(format!("Prefix length out of range: /{prefix_len}"));
        }

        let raw = u32::from(addr);
        let network = Ipv4Addr::from(raw & Self::mask_bits(prefix_len));
        if network != addr {
            return Err(format!(
                "CIDR {s} has host bits set; network address is {network}/{prefix_len}"
            ));
        }

        Ok(Self { network, prefix_len })
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl CidrBlock {
    /// Creates a block from a network address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is out of range or host bits
    /// are set.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, String> {
        format!("{network}/{prefix_len}").parse()
    }

    /// Returns the number of `/sub_prefix` blocks that fit inside this block,
    /// or 0 if `sub_prefix` is wider than this block. Saturates at
    /// `u32::MAX` for the /0 into /32 case.
    #[must_use]
    pub const fn sub_block_count(&self, sub_prefix: u8) -> u32 {
        if sub_prefix < self.prefix_len || sub_prefix > 32 {
            return 0;
        }
        let shift = sub_prefix - self.prefix_len;
        if shift >= 32 {
            return u32::MAX;
        }
        1_u32 << shift
    }

    /// Returns the `index`-th `/sub_prefix` block inside this block.
    ///
    /// Blocks are addressed in ascending network order, so the layout is
    /// reproducible across planning runs.
    #[must_use]
    pub fn sub_block(&self, sub_prefix: u8, index: u32) -> Option<Self> {
        if index >= self.sub_block_count(sub_prefix) {
            return None;
        }
        let step = 1_u32 << (32 - sub_prefix);
        let network = Ipv4Addr::from(u32::from(self.network) + index * step);
        Some(Self {
            network,
            prefix_len: sub_prefix,
        })
    }

    /// Returns true if `other` is fully contained in this block.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        if other.prefix_len < self.prefix_len {
            return false;
        }
        let mask = Self::mask_bits(self.prefix_len);
        (u32::from(other.network) & mask) == u32::from(self.network)
    }

    /// Returns true if this block and `other` share any address.
    #[must_use]
    pub fn overlaps_with(&self, other: &Self) -> bool {
        self.contains(other) || other.contains(self)
    }

    const fn mask_bits(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        }
    }
}

impl StorageIdentityConfig {
    /// Returns the effective ACL owner uid (defaults to the POSIX uid).
    #[must_use]
    pub const fn effective_acl_owner_uid(&self) -> u32 {
        match self.acl_owner_uid {
            Some(uid) => uid,
            None => self.uid,
        }
    }

    /// Returns the effective ACL owner gid (defaults to the POSIX gid).
    #[must_use]
    pub const fn effective_acl_owner_gid(&self) -> u32 {
        match self.acl_owner_gid {
            Some(gid) => gid,
            None => self.gid,
        }
    }
}

impl EnvVar {
    /// Creates a new environment variable declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl TopologyDescriptor {
    /// Returns the fully qualified application name including environment.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.app_name, self.environment)
    }

    /// Returns the security group name for this application.
    #[must_use]
    pub fn security_group_name(&self) -> String {
        format!("{}-web", self.qualified_name())
    }
}
