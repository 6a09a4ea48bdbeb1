//! Descriptor hashing for plan fingerprinting.
//!
//! Every resource graph is stamped with a deterministic hash of the
//! descriptor it was derived from, so a backend can detect whether a stored
//! graph still matches the declared topology without re-running the planners.

use sha2::{Digest, Sha256};

use super::spec::TopologyDescriptor;

/// Hasher for computing descriptor fingerprints.
#[derive(Debug, Default)]
pub struct DescriptorHasher;

impl DescriptorHasher {
    /// Creates a new descriptor hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire topology descriptor.
    ///
    /// This hash changes when any planning-relevant field changes. Fields are
    /// fed to the hasher in a fixed order, with length prefixes on variable
    /// fields, so the result is stable across runs and platforms.
    #[must_use]
    pub fn hash_descriptor(&self, descriptor: &TopologyDescriptor) -> String {
        let mut hasher = Sha256::new();

        Self::update_str(&mut hasher, &descriptor.app_name);
        Self::update_str(&mut hasher, &descriptor.environment);
        Self::update_str(&mut hasher, &descriptor.container_image);
        hasher.update(descriptor.container_port.to_be_bytes());
        Self::update_str(&mut hasher, &descriptor.working_directory);

        hasher.update((descriptor.environment_variables.len() as u64).to_be_bytes());
        for var in &descriptor.environment_variables {
            Self::update_str(&mut hasher, &var.name);
            Self::update_str(&mut hasher, &var.value);
        }

        let identity = &descriptor.storage_identity;
        hasher.update(identity.uid.to_be_bytes());
        hasher.update(identity.gid.to_be_bytes());
        hasher.update(identity.permissions.to_be_bytes());
        hasher.update(identity.effective_acl_owner_uid().to_be_bytes());
        hasher.update(identity.effective_acl_owner_gid().to_be_bytes());

        hasher.update(descriptor.cpu_units.to_be_bytes());
        hasher.update(descriptor.memory_mib.to_be_bytes());
        hasher.update(descriptor.az_count.to_be_bytes());
        Self::update_str(&mut hasher, &descriptor.cidr_block.to_string());
        hasher.update(descriptor.listener_port.to_be_bytes());
        Self::update_str(&mut hasher, &descriptor.volume_name);

        hex::encode(hasher.finalize())
    }

    fn update_str(hasher: &mut Sha256, value: &str) {
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::spec::{EnvVar, StorageIdentityConfig};

    fn descriptor() -> TopologyDescriptor {
        TopologyDescriptor {
            app_name: String::from("gitness"),
            environment: String::from("dev"),
            container_image: String::from("harness/gitness"),
            container_port: 3000,
            working_directory: String::from("/data"),
            environment_variables: vec![EnvVar::new("GITNESS_URL_BASE", "http://example.test/")],
            storage_identity: StorageIdentityConfig {
                uid: 1000,
                gid: 1000,
                permissions: 755,
                acl_owner_uid: None,
                acl_owner_gid: None,
            },
            cpu_units: 256,
            memory_mib: 512,
            az_count: 3,
            cidr_block: "172.32.0.0/16".parse().unwrap(),
            listener_port: 80,
            volume_name: String::from("data"),
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = DescriptorHasher::new();
        let a = hasher.hash_descriptor(&descriptor());
        let b = hasher.hash_descriptor(&descriptor());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_changes_with_any_field() {
        let hasher = DescriptorHasher::new();
        let base = hasher.hash_descriptor(&descriptor());

        let mut changed = descriptor();
        changed.container_port = 3001;
        assert_ne!(base, hasher.hash_descriptor(&changed));

        let mut changed = descriptor();
        changed.environment_variables[0].value = String::from("http://other.test/");
        assert_ne!(base, hasher.hash_descriptor(&changed));

        let mut changed = descriptor();
        changed.storage_identity.acl_owner_uid = Some(0);
        assert_ne!(base, hasher.hash_descriptor(&changed));
    }

    #[test]
    fn test_length_prefix_prevents_field_bleed() {
        let hasher = DescriptorHasher::new();

        let mut a = descriptor();
        a.app_name = String::from("git");
        a.environment = String::from("nessdev");

        let mut b = descriptor();
        b.app_name = String::from("gitness");
        b.environment = String::from("dev");

        assert_ne!(hasher.hash_descriptor(&a), hasher.hash_descriptor(&b));
    }
}
