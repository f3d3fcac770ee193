//! http handlers for the shipyard api.

mod error;
mod health;
mod machine_auth;
mod machine_built;

pub use error::{ApiError, ErrorBody};
pub use health::health;
pub use machine_built::{MachineBuiltResponse, apply_build_report, machine_built};
