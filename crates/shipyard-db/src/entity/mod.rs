//! database entity models for sea-orm.
//!
//! these entities map to database tables and handle conversion
//! of domain types to/from database columns.

pub mod machine;
