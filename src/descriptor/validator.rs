//! Structural validation for topology descriptors.
//!
//! This module checks a [`TopologyDescriptor`] for structural consistency
//! before any planner runs: naming conventions, port and sizing sanity,
//! path shapes, and permission masks. Cross-plan invariants (identity
//! matching, sizing table membership, volume references) belong to the
//! individual planners and are not duplicated here.

use crate::error::{DescriptorError, Result, TopoplanError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::TopologyDescriptor;

/// Widest base CIDR prefix accepted for the network block.
const MAX_BASE_PREFIX_LEN: u8 = 16;

/// Validator for topology descriptors.
#[derive(Debug, Default)]
pub struct DescriptorValidator;

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl DescriptorValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a topology descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found; the full list of errors and
    /// warnings is available in the returned [`ValidationResult`] on success.
    pub fn validate(&self, descriptor: &TopologyDescriptor) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_identity(descriptor, &mut result);
        Self::validate_container(descriptor, &mut result);
        Self::validate_network(descriptor, &mut result);
        Self::validate_storage(descriptor, &mut result);
        Self::validate_environment(descriptor, &mut result);

        if result.errors.is_empty() {
            debug!("Descriptor validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(TopoplanError::Descriptor(DescriptorError::validation(
                first_error.field.clone(),
                first_error.message.clone(),
            )))
        }
    }

    /// Validates application identity fields.
    fn validate_identity(descriptor: &TopologyDescriptor, result: &mut ValidationResult) {
        if descriptor.app_name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("app_name"),
                message: String::from("Application name cannot be empty"),
            });
        } else if !is_valid_name(&descriptor.app_name) {
            result.errors.push(ValidationError {
                field: String::from("app_name"),
                message: format!(
                    "Application name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    descriptor.app_name
                ),
            });
        }

        if descriptor.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("environment"),
                message: String::from("Environment cannot be empty"),
            });
        }
    }

    /// Validates container image, port, sizing, and working directory.
    fn validate_container(descriptor: &TopologyDescriptor, result: &mut ValidationResult) {
        if descriptor.container_image.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("container_image"),
                message: String::from("Container image cannot be empty"),
            });
        }

        if descriptor.container_image.ends_with(":latest") {
            result.warnings.push(String::from(
                "container_image: Using ':latest' tag is not recommended for production",
            ));
        }

        if descriptor.container_port == 0 {
            result.errors.push(ValidationError {
                field: String::from("container_port"),
                message: String::from("Container port cannot be 0"),
            });
        }

        if descriptor.listener_port == 0 {
            result.errors.push(ValidationError {
                field: String::from("listener_port"),
                message: String::from("Listener port cannot be 0"),
            });
        }

        if !descriptor.working_directory.starts_with('/') {
            result.errors.push(ValidationError {
                field: String::from("working_directory"),
                message: format!(
                    "Working directory must be absolute: {}",
                    descriptor.working_directory
                ),
            });
        }

        if descriptor.cpu_units == 0 {
            result.errors.push(ValidationError {
                field: String::from("cpu_units"),
                message: String::from("CPU units must be at least 1"),
            });
        }

        if descriptor.memory_mib == 0 {
            result.errors.push(ValidationError {
                field: String::from("memory_mib"),
                message: String::from("Memory must be at least 1 MiB"),
            });
        }
    }

    /// Validates network shape fields.
    fn validate_network(descriptor: &TopologyDescriptor, result: &mut ValidationResult) {
        if descriptor.az_count == 0 {
            result.errors.push(ValidationError {
                field: String::from("az_count"),
                message: String::from("At least one availability zone is required"),
            });
        }

        if descriptor.cidr_block.prefix_len > MAX_BASE_PREFIX_LEN {
            result.errors.push(ValidationError {
                field: String::from("cidr_block"),
                message: format!(
                    "Base CIDR block must be a /{MAX_BASE_PREFIX_LEN} or larger, got {}",
                    descriptor.cidr_block
                ),
            });
        }
    }

    /// Validates storage identity fields.
    fn validate_storage(descriptor: &TopologyDescriptor, result: &mut ValidationResult) {
        if !is_valid_name(&descriptor.volume_name) {
            result.errors.push(ValidationError {
                field: String::from("volume_name"),
                message: format!(
                    "Volume name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    descriptor.volume_name
                ),
            });
        }

        if !is_octal_mask(descriptor.storage_identity.permissions) {
            result.errors.push(ValidationError {
                field: String::from("storage_identity.permissions"),
                message: format!(
                    "Permission mask {} is not a valid octal triplet (each digit 0-7)",
                    descriptor.storage_identity.permissions
                ),
            });
        }
    }

    /// Validates environment variable names.
    ///
    /// Duplicate names are deliberately left to the compute planner, which
    /// rejects them when folding the declaration list into a map.
    fn validate_environment(descriptor: &TopologyDescriptor, result: &mut ValidationResult) {
        let mut seen: HashSet<&str> = HashSet::new();

        for (i, var) in descriptor.environment_variables.iter().enumerate() {
            if var.name.is_empty() || !is_valid_env_name(&var.name) {
                result.errors.push(ValidationError {
                    field: format!("environment_variables[{i}].name"),
                    message: format!(
                        "Environment variable name '{}' is invalid. \
                         Must be uppercase alphanumeric with underscores.",
                        var.name
                    ),
                });
            }

            if !seen.insert(&var.name) {
                result.warnings.push(format!(
                    "environment_variables[{i}]: key '{}' is declared more than once \
                     and will be rejected during compute planning",
                    var.name
                ));
            }
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase()
    {
        return false;
    }

    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }

    if name.ends_with('-') {
        return false;
    }

    if name.contains("--") {
        return false;
    }

    true
}

/// Validates an environment variable name (POSIX-ish: `[A-Z_][A-Z0-9_]*`).
fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Returns true if every decimal digit of `mask` is a valid octal digit.
/// Accepts three- or four-digit masks (e.g., 755, 0755 collapses to 755).
const fn is_octal_mask(mask: u16) -> bool {
    if mask > 7777 {
        return false;
    }
    let mut rest = mask;
    while rest > 0 {
        if rest % 10 > 7 {
            return false;
        }
        rest /= 10;
    }
    true
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
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
    fn test_valid_descriptor_passes() {
        let result = DescriptorValidator::new().validate(&descriptor()).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_invalid_app_name_rejected() {
        let mut desc = descriptor();
        desc.app_name = String::from("Gitness-Web");
        let err = DescriptorValidator::new().validate(&desc).unwrap_err();
        assert_eq!(err.field_path(), Some("app_name"));
    }

    #[test]
    fn test_relative_working_directory_rejected() {
        let mut desc = descriptor();
        desc.working_directory = String::from("data");
        let err = DescriptorValidator::new().validate(&desc).unwrap_err();
        assert_eq!(err.field_path(), Some("working_directory"));
    }

    #[test]
    fn test_narrow_cidr_rejected() {
        let mut desc = descriptor();
        desc.cidr_block = "10.1.0.0/20".parse().unwrap();
        let err = DescriptorValidator::new().validate(&desc).unwrap_err();
        assert_eq!(err.field_path(), Some("cidr_block"));
    }

    #[test]
    fn test_zero_az_count_rejected() {
        let mut desc = descriptor();
        desc.az_count = 0;
        let err = DescriptorValidator::new().validate(&desc).unwrap_err();
        assert_eq!(err.field_path(), Some("az_count"));
    }

    #[test]
    fn test_bad_permission_mask_rejected() {
        let mut desc = descriptor();
        desc.storage_identity.permissions = 788;
        let err = DescriptorValidator::new().validate(&desc).unwrap_err();
        assert_eq!(err.field_path(), Some("storage_identity.permissions"));
    }

    #[test]
    fn test_duplicate_env_key_is_warning_here() {
        let mut desc = descriptor();
        desc.environment_variables
            .push(EnvVar::new("GITNESS_URL_BASE", "http://other.test/"));
        let result = DescriptorValidator::new().validate(&desc).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_latest_tag_warns() {
        let mut desc = descriptor();
        desc.container_image = String::from("harness/gitness:latest");
        let result = DescriptorValidator::new().validate(&desc).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_env_name_convention() {
        assert!(is_valid_env_name("GITNESS_URL_BASE"));
        assert!(is_valid_env_name("_PRIVATE"));
        assert!(!is_valid_env_name("lowercase"));
        assert!(!is_valid_env_name("1LEADING"));
        assert!(!is_valid_env_name(""));
    }

    #[test]
    fn test_octal_mask() {
        assert!(is_octal_mask(755));
        assert!(is_octal_mask(644));
        assert!(is_octal_mask(0));
        assert!(!is_octal_mask(788));
        assert!(!is_octal_mask(7778));
    }
}
