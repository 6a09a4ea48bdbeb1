//! In-memory provisioning backend.
//!
//! Records every resource the applier asks for without touching any real
//! infrastructure. Health checks replay a caller-supplied script, which
//! makes the rollout paths (steady, rollback, failed rollback) directly
//! testable. Also usable as a dry-run backend.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::error::{ApplyError, Result};
use crate::planner::{ComputePlan, HealthSignal, NetworkPlan, SecurityPlan, ServicePlan, StoragePlan};

use super::ProvisioningBackend;

/// A resource recorded by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedResource {
    /// Resource kind (matches the apply step names).
    pub kind: String,
    /// Resource name from the plan fragment.
    pub name: String,
    /// Handle the backend issued.
    pub id: String,
}

/// Recording fake backend with scripted health signals.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    created: Vec<CreatedResource>,
    health_script: VecDeque<HealthSignal>,
    rollbacks: u32,
    fail_on: Option<String>,
    next_id: u32,
}

impl InMemoryBackend {
    /// Creates an empty backend whose services are always healthy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sequence of health signals returned by successive checks.
    /// Once the script is exhausted, checks report healthy.
    #[must_use]
    pub fn with_health_script(mut self, script: Vec<HealthSignal>) -> Self {
        self.health_script = script.into();
        self
    }

    /// Makes creation of the given resource kind fail.
    #[must_use]
    pub fn failing_on(mut self, kind: impl Into<String>) -> Self {
        self.fail_on = Some(kind.into());
        self
    }

    /// Returns the kinds of created resources, in creation order.
    #[must_use]
    pub fn created_kinds(&self) -> Vec<&str> {
        self.created.iter().map(|r| r.kind.as_str()).collect()
    }

    /// Returns all recorded resources.
    #[must_use]
    pub fn created(&self) -> &[CreatedResource] {
        &self.created
    }

    /// Returns how many rollbacks were requested.
    #[must_use]
    pub const fn rollback_count(&self) -> u32 {
        self.rollbacks
    }

    fn create(&mut self, kind: &str, name: &str) -> Result<String> {
        if self.fail_on.as_deref() == Some(kind) {
            return Err(ApplyError::create_failed(kind, name, "simulated backend failure").into());
        }
        self.next_id += 1;
        let id = format!("{kind}-{}", self.next_id);
        self.created.push(CreatedResource {
            kind: String::from(kind),
            name: String::from(name),
            id: id.clone(),
        });
        Ok(id)
    }
}

#[async_trait]
impl ProvisioningBackend for InMemoryBackend {
    async fn create_network(&mut self, plan: &NetworkPlan) -> Result<String> {
        self.create("network", &plan.cidr_block.to_string())
    }

    async fn create_security_group(
        &mut self,
        plan: &SecurityPlan,
        _network_id: &str,
    ) -> Result<String> {
        self.create("security-group", &plan.group_name)
    }

    async fn create_filesystem(
        &mut self,
        plan: &StoragePlan,
        _security_group_id: &str,
    ) -> Result<String> {
        self.create("filesystem", &plan.volume_name)
    }

    async fn register_task(
        &mut self,
        plan: &ComputePlan,
        _filesystem_ids: &[String],
    ) -> Result<String> {
        self.create("task-definition", &plan.container.name)
    }

    async fn create_service(
        &mut self,
        plan: &ServicePlan,
        _task_definition_id: &str,
        _security_group_id: &str,
    ) -> Result<String> {
        self.create("service", &plan.security_group)
    }

    async fn check_service_health(&mut self, _service_id: &str) -> Result<HealthSignal> {
        Ok(self.health_script.pop_front().unwrap_or(HealthSignal::Healthy))
    }

    async fn rollback_service(&mut self, _service_id: &str) -> Result<()> {
        self.rollbacks += 1;
        Ok(())
    }
}
