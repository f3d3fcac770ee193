//! error types for shipyard-types

use thiserror::Error;

/// errors that can occur in shipyard-types
#[derive(Debug, Error)]
pub enum Error {
    /// machine id is empty or too long
    #[error("invalid machine id: {0}")]
    InvalidMachineId(String),

    /// unknown machine status string
    #[error("invalid machine status: {0}")]
    InvalidStatus(String),

    /// configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
