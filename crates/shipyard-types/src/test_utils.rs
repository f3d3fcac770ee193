//! test utilities for creating test machines and other fixtures.
//!
//! this module provides builder patterns for creating test instances
//! of shipyard types without needing to specify all fields.

use chrono::Utc;

use crate::{Machine, MachineId, MachineStatus};

/// builder for creating test [`Machine`] instances.
///
/// # example
/// ```
/// use shipyard_types::MachineStatus;
/// use shipyard_types::test_utils::TestMachineBuilder;
///
/// let machine = TestMachineBuilder::new("m1").build();
/// let ready = TestMachineBuilder::new("m2")
///     .with_status(MachineStatus::Ready)
///     .with_endpoint("http://10.0.0.5:8000")
///     .build();
/// assert_eq!(machine.status, MachineStatus::Pending);
/// assert_eq!(ready.endpoint.as_deref(), Some("http://10.0.0.5:8000"));
/// ```
#[derive(Debug, Clone)]
pub struct TestMachineBuilder {
    id: String,
    name: Option<String>,
    status: MachineStatus,
    endpoint: Option<String>,
    build_log: Option<String>,
}

impl TestMachineBuilder {
    /// create a new builder with the given machine id.
    ///
    /// panics if the id is not a valid [`MachineId`].
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            status: MachineStatus::Pending,
            endpoint: None,
            build_log: None,
        }
    }

    /// set the display name (defaults to the id).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// set the status.
    pub fn with_status(mut self, status: MachineStatus) -> Self {
        self.status = status;
        self
    }

    /// set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// set the build log.
    pub fn with_build_log(mut self, build_log: impl Into<String>) -> Self {
        self.build_log = Some(build_log.into());
        self
    }

    /// build the machine.
    pub fn build(self) -> Machine {
        let id = MachineId::new(self.id).expect("test machine id must be valid");
        Machine {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            status: self.status,
            endpoint: self.endpoint,
            build_log: self.build_log,
            created_at: Utc::now(),
        }
    }
}
