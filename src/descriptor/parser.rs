//! Descriptor parser for loading topology files.
//!
//! The descriptor is supplied by an external configuration source as a YAML
//! document (`topoplan.topology.yaml` by convention). This module only loads
//! and deserializes; structural validation lives in
//! [`DescriptorValidator`](super::validator::DescriptorValidator).

use crate::error::{DescriptorError, Result, TopoplanError};
use std::path::Path;
use tracing::{debug, info};

use super::spec::TopologyDescriptor;

/// Parser for topology descriptor files.
#[derive(Debug, Default)]
pub struct DescriptorParser;

impl DescriptorParser {
    /// Creates a new descriptor parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a descriptor from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<TopologyDescriptor> {
        let path = path.as_ref();
        info!("Loading topology descriptor from: {}", path.display());

        if !path.exists() {
            return Err(TopoplanError::Descriptor(DescriptorError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TopoplanError::Descriptor(DescriptorError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a descriptor from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<TopologyDescriptor> {
        debug!("Parsing YAML topology descriptor");

        let descriptor: TopologyDescriptor = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            TopoplanError::Descriptor(DescriptorError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Successfully parsed descriptor for application: {}",
            descriptor.app_name
        );
        Ok(descriptor)
    }
}
