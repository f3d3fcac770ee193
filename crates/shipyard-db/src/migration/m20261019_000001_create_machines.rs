//! create machines table migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Machines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Machines::Id)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Machines::Name).string().not_null())
                    .col(
                        ColumnDef::new(Machines::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Machines::Endpoint).string())
                    .col(ColumnDef::new(Machines::BuildLog).text())
                    .col(
                        ColumnDef::new(Machines::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // index on status for listing machines by lifecycle stage
        manager
            .create_index(
                Index::create()
                    .name("idx_machines_status")
                    .table(Machines::Table)
                    .col(Machines::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Machines::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Machines {
    Table,
    Id,
    Name,
    Status,
    Endpoint,
    BuildLog,
    CreatedAt,
}
