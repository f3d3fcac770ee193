//! core types for shipyard - build callbacks for provisioned machines.
//!
//! this crate provides the fundamental data structures used throughout shipyard:
//! - `machine`: machine records, statuses and the build-callback transition
//! - `config`: application configuration

#![warn(missing_docs)]

mod config;
mod error;
mod machine;
pub mod test_utils;

pub use config::{
    Config, DEFAULT_MAX_CALLBACK_BODY_BYTES, DatabaseConfig, SqliteConfig, TokenConfig,
};
pub use error::Error;
pub use machine::{
    BuildReport, MAX_MACHINE_ID_LEN, Machine, MachineId, MachineStatus, MachineUpdate,
};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
