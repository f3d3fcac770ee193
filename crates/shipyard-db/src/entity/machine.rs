//! machine entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use shipyard_types::{Machine, MachineId, MachineStatus};

/// machine database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "machines")]
pub struct Model {
    /// caller-supplied id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// display name
    pub name: String,

    /// machinestatus as lowercase string
    pub status: String,

    /// reachable address, set by a successful build
    pub endpoint: Option<String>,

    /// output of the last build
    #[sea_orm(column_type = "Text", nullable)]
    pub build_log: Option<String>,

    /// when the record was created
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Machine {
    type Error = shipyard_types::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Machine {
            id: MachineId::new(model.id)?,
            name: model.name,
            status: model.status.parse::<MachineStatus>()?,
            endpoint: model.endpoint,
            build_log: model.build_log,
            created_at: model.created_at,
        })
    }
}

impl From<&Machine> for ActiveModel {
    fn from(machine: &Machine) -> Self {
        Self {
            id: Set(machine.id.as_str().to_string()),
            name: Set(machine.name.clone()),
            status: Set(machine.status.as_str().to_string()),
            endpoint: Set(machine.endpoint.clone()),
            build_log: Set(machine.build_log.clone()),
            created_at: Set(machine.created_at),
        }
    }
}
