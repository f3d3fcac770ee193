//! machine type representing a provisioned build target.
//!
//! machines are created elsewhere in `pending`/`building` state. the only
//! mutation this workspace performs on them is the terminal transition
//! reported by the machine's own build callback.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// maximum length for a machine id.
pub const MAX_MACHINE_ID_LEN: usize = 255;

/// opaque unique identifier for a machine.
///
/// ids are supplied by callers and never generated here. the only
/// constraints are that they are non-empty and fit in the id column.
///
/// # Example
/// ```
/// use shipyard_types::MachineId;
///
/// let id: MachineId = "m1".parse().unwrap();
/// assert_eq!(id.as_str(), "m1");
/// assert!("".parse::<MachineId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(String);

impl MachineId {
    /// create a new machine id, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s.is_empty() {
            return Err(Error::InvalidMachineId("machine id cannot be empty".into()));
        }
        if s.len() > MAX_MACHINE_ID_LEN {
            return Err(Error::InvalidMachineId(format!(
                "machine id too long ({} chars, max {})",
                s.len(),
                MAX_MACHINE_ID_LEN
            )));
        }
        Ok(Self(s))
    }

    /// get the machine id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MachineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for MachineId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MachineId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MachineId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// serde: deserialize with validation
impl<'de> Deserialize<'de> for MachineId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MachineId::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for MachineId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// lifecycle status of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    /// created, build not started
    Pending,
    /// build in progress
    Building,
    /// build succeeded, endpoint reachable
    Ready,
    /// build failed
    Error,
}

impl MachineStatus {
    /// the lowercase string stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "building" => Ok(Self::Building),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// a provisioned machine tracked by id and lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// caller-supplied primary key.
    pub id: MachineId,
    /// display name.
    pub name: String,
    /// current lifecycle status.
    pub status: MachineStatus,
    /// address where the built machine is reachable (set on success only).
    pub endpoint: Option<String>,
    /// diagnostic output from the last build.
    pub build_log: Option<String>,
    /// when the machine record was created.
    pub created_at: DateTime<Utc>,
}

impl Machine {
    /// create a new machine in `pending` state.
    pub fn new(id: MachineId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: MachineStatus::Pending,
            endpoint: None,
            build_log: None,
            created_at: Utc::now(),
        }
    }
}

/// body of a build-finished callback.
///
/// `endpoint` present and non-empty means the build succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// machine the report is about; must match the token.
    pub machine_id: MachineId,
    /// address of the built machine, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// build output, usually sent on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_log: Option<String>,
}

/// the column values a single build callback writes.
///
/// `None` leaves the stored column untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineUpdate {
    /// terminal status to write (`ready` or `error`).
    pub status: MachineStatus,
    /// new endpoint, set only on the `ready` path.
    pub endpoint: Option<String>,
    /// new build log, when the report carried one.
    pub build_log: Option<String>,
}

impl MachineUpdate {
    /// derive the terminal transition for a build report.
    ///
    /// a non-empty endpoint moves the machine to `ready` and records the
    /// endpoint. anything else moves it to `error` and never touches a
    /// stored endpoint. `build_log` overwrites only when supplied.
    pub fn from_report(report: &BuildReport) -> Self {
        match report.endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => Self {
                status: MachineStatus::Ready,
                endpoint: Some(endpoint.to_string()),
                build_log: report.build_log.clone(),
            },
            None => Self {
                status: MachineStatus::Error,
                endpoint: None,
                build_log: report.build_log.clone(),
            },
        }
    }
}
