//! database layer for shipyard.
//!
//! this crate provides persistent storage for machine records and the
//! single-row update used by the build callback.

#![warn(missing_docs)]

mod entity;
mod error;
mod migration;

pub use error::Error;

use std::future::Future;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database as SeaOrmDatabase, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, sea_query::Expr,
};
use sea_orm_migration::MigratorTrait;

use shipyard_types::{Config, Machine, MachineId, MachineUpdate};

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// database trait for shipyard storage operations.
///
/// this trait abstracts over different database backends (sqlite, postgresql).
pub trait Database: Send + Sync {
    // ─── Health Check ─────────────────────────────────────────────────────────

    /// ping the database to verify connectivity.
    ///
    /// returns `ok(())` if the database is reachable, `err` otherwise.
    /// used for health checks with a recommended timeout of 1 second.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    // ─── Machine Operations ──────────────────────────────────────────────────

    /// create a new machine. fails with [`Error::AlreadyExists`] on a duplicate id.
    fn create_machine(&self, machine: &Machine) -> impl Future<Output = Result<Machine>> + Send;

    /// get a machine by id. returns `None` if not found.
    fn get_machine(&self, id: &MachineId) -> impl Future<Output = Result<Option<Machine>>> + Send;

    /// list all machines, oldest first.
    fn list_machines(&self) -> impl Future<Output = Result<Vec<Machine>>> + Send;

    /// write the columns in `update` to the machine row matching `id`.
    ///
    /// this is a single `UPDATE ... WHERE id = ?`; `None` fields are left
    /// untouched. returns the number of rows affected, which is zero when
    /// no machine has that id.
    fn update_machine(
        &self,
        id: &MachineId,
        update: &MachineUpdate,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// the main database implementation using sea-orm.
#[derive(Clone)]
pub struct ShipyardDb {
    conn: DatabaseConnection,
}

impl ShipyardDb {
    /// create a new database connection from config.
    pub async fn new(config: &Config) -> Result<Self> {
        let url = Self::build_connection_url(&config.database)?;
        let conn: DatabaseConnection = SeaOrmDatabase::connect(&url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };

        // enable WAL mode for sqlite if configured
        if config.database.db_type == "sqlite" && config.database.sqlite.write_ahead_log {
            db.enable_wal_mode().await?;
        }

        db.migrate().await?;
        Ok(db)
    }

    /// enable write-ahead logging mode for sqlite.
    ///
    /// must be called before any writes.
    async fn enable_wal_mode(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("PRAGMA journal_mode=WAL")
            .await
            .map_err(|e| Error::Connection(format!("failed to enable WAL mode: {}", e)))?;
        tracing::info!("sqlite WAL mode enabled");
        Ok(())
    }

    /// get the current sqlite journal mode.
    #[cfg(test)]
    async fn get_journal_mode(&self) -> Result<String> {
        use sea_orm::{ConnectionTrait, FromQueryResult};

        #[derive(FromQueryResult)]
        struct JournalMode {
            journal_mode: String,
        }

        let row = self
            .conn
            .query_one(sea_orm::Statement::from_string(
                sea_orm::DatabaseBackend::Sqlite,
                "PRAGMA journal_mode".to_string(),
            ))
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        match row {
            Some(row) => Ok(JournalMode::from_query_result(&row, "")?.journal_mode),
            None => Ok(String::new()),
        }
    }

    /// build a sea-orm compatible connection url from config.
    fn build_connection_url(config: &shipyard_types::DatabaseConfig) -> Result<String> {
        match config.db_type.as_str() {
            "sqlite" => {
                let path = if config.connection_string.starts_with("sqlite:") {
                    config.connection_string.clone()
                } else {
                    format!("sqlite:{}", config.connection_string)
                };
                // add ?mode=rwc to create file if it doesn't exist
                if path.contains('?') {
                    Ok(path)
                } else {
                    Ok(format!("{}?mode=rwc", path))
                }
            }
            "postgres" | "postgresql" => Ok(config.connection_string.clone()),
            other => Err(Error::InvalidData(format!(
                "unsupported database type: {}",
                other
            ))),
        }
    }

    /// create an in-memory sqlite database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn: DatabaseConnection = SeaOrmDatabase::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        Ok(())
    }
}

impl Database for ShipyardDb {
    async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    async fn create_machine(&self, machine: &Machine) -> Result<Machine> {
        let model: entity::machine::ActiveModel = machine.into();
        let result = model.insert(&self.conn).await?;
        Ok(Machine::try_from(result)?)
    }

    async fn get_machine(&self, id: &MachineId) -> Result<Option<Machine>> {
        let result = entity::machine::Entity::find_by_id(id.as_str())
            .one(&self.conn)
            .await?;
        Ok(result.map(Machine::try_from).transpose()?)
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        let results = entity::machine::Entity::find()
            .order_by_asc(entity::machine::Column::CreatedAt)
            .order_by_asc(entity::machine::Column::Id)
            .all(&self.conn)
            .await?;
        let machines = results
            .into_iter()
            .map(Machine::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(machines)
    }

    async fn update_machine(&self, id: &MachineId, update: &MachineUpdate) -> Result<u64> {
        let mut query = entity::machine::Entity::update_many()
            .col_expr(
                entity::machine::Column::Status,
                Expr::value(update.status.as_str()),
            )
            .filter(entity::machine::Column::Id.eq(id.as_str()));

        if let Some(endpoint) = &update.endpoint {
            query = query.col_expr(
                entity::machine::Column::Endpoint,
                Expr::value(endpoint.clone()),
            );
        }
        if let Some(build_log) = &update.build_log {
            query = query.col_expr(
                entity::machine::Column::BuildLog,
                Expr::value(build_log.clone()),
            );
        }

        let result = query.exec(&self.conn).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_types::test_utils::TestMachineBuilder;
    use shipyard_types::{BuildReport, MachineStatus};

    async fn setup_test_db() -> ShipyardDb {
        ShipyardDb::new_in_memory().await.unwrap()
    }

    fn report(id: &str, endpoint: Option<&str>, build_log: Option<&str>) -> BuildReport {
        BuildReport {
            machine_id: id.parse().unwrap(),
            endpoint: endpoint.map(str::to_string),
            build_log: build_log.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let db = setup_test_db().await;
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_machine_create_get_list() {
        let db = setup_test_db().await;

        let created = db
            .create_machine(&TestMachineBuilder::new("m1").with_name("gpu box").build())
            .await
            .unwrap();
        assert_eq!(created.id, "m1");
        assert_eq!(created.status, MachineStatus::Pending);

        let fetched = db.get_machine(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "gpu box");
        assert_eq!(fetched.endpoint, None);

        db.create_machine(&TestMachineBuilder::new("m2").build())
            .await
            .unwrap();
        let machines = db.list_machines().await.unwrap();
        assert_eq!(machines.len(), 2);

        let missing = db.get_machine(&"nope".parse().unwrap()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_machine_id_rejected() {
        let db = setup_test_db().await;
        db.create_machine(&TestMachineBuilder::new("m1").build())
            .await
            .unwrap();

        let result = db.create_machine(&TestMachineBuilder::new("m1").build()).await;
        assert!(result.is_err(), "duplicate machine id should be rejected");
    }

    #[tokio::test]
    async fn test_update_machine_to_ready() {
        let db = setup_test_db().await;
        let machine = db
            .create_machine(
                &TestMachineBuilder::new("m1")
                    .with_status(MachineStatus::Building)
                    .build(),
            )
            .await
            .unwrap();

        let update = MachineUpdate::from_report(&report(
            "m1",
            Some("http://10.0.0.5:8000"),
            Some("done"),
        ));
        let rows = db.update_machine(&machine.id, &update).await.unwrap();
        assert_eq!(rows, 1);

        let stored = db.get_machine(&machine.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MachineStatus::Ready);
        assert_eq!(stored.endpoint.as_deref(), Some("http://10.0.0.5:8000"));
        assert_eq!(stored.build_log.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_update_machine_to_error_keeps_endpoint() {
        let db = setup_test_db().await;
        let machine = db
            .create_machine(
                &TestMachineBuilder::new("m1")
                    .with_status(MachineStatus::Ready)
                    .with_endpoint("http://old:8000")
                    .with_build_log("previous")
                    .build(),
            )
            .await
            .unwrap();

        let update = MachineUpdate::from_report(&report("m1", None, Some("compile error")));
        db.update_machine(&machine.id, &update).await.unwrap();

        let stored = db.get_machine(&machine.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MachineStatus::Error);
        assert_eq!(stored.endpoint.as_deref(), Some("http://old:8000"));
        assert_eq!(stored.build_log.as_deref(), Some("compile error"));
    }

    #[tokio::test]
    async fn test_update_without_build_log_leaves_it() {
        let db = setup_test_db().await;
        let machine = db
            .create_machine(&TestMachineBuilder::new("m1").with_build_log("kept").build())
            .await
            .unwrap();

        let update = MachineUpdate::from_report(&report("m1", None, None));
        db.update_machine(&machine.id, &update).await.unwrap();

        let stored = db.get_machine(&machine.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MachineStatus::Error);
        assert_eq!(stored.build_log.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_update_unknown_machine_affects_no_rows() {
        let db = setup_test_db().await;
        db.create_machine(&TestMachineBuilder::new("m1").build())
            .await
            .unwrap();

        let update = MachineUpdate::from_report(&report("ghost", Some("http://a:1"), None));
        let rows = db
            .update_machine(&"ghost".parse().unwrap(), &update)
            .await
            .unwrap();
        assert_eq!(rows, 0);

        // other rows are untouched
        let m1 = db.get_machine(&"m1".parse().unwrap()).await.unwrap().unwrap();
        assert_eq!(m1.status, MachineStatus::Pending);
    }

    #[tokio::test]
    async fn test_repeated_update_is_idempotent() {
        let db = setup_test_db().await;
        let machine = db
            .create_machine(&TestMachineBuilder::new("m1").build())
            .await
            .unwrap();
        let update = MachineUpdate::from_report(&report("m1", Some("http://a:1"), Some("ok")));

        assert_eq!(db.update_machine(&machine.id, &update).await.unwrap(), 1);
        let first = db.get_machine(&machine.id).await.unwrap().unwrap();

        // same row still matches on replay
        assert_eq!(db.update_machine(&machine.id, &update).await.unwrap(), 1);
        let second = db.get_machine(&machine.id).await.unwrap().unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sqlite_wal_mode_enabled() {
        // WAL mode requires a file-based database, not :memory:
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test_wal.db");

        let mut config = Config::default();
        config.database.db_type = "sqlite".to_string();
        config.database.connection_string = db_path.to_string_lossy().to_string();
        config.database.sqlite.write_ahead_log = true;

        let db = ShipyardDb::new(&config).await.unwrap();
        let mode = db.get_journal_mode().await.unwrap();
        assert_eq!(mode.to_lowercase(), "wal", "journal mode should be WAL");
    }

    #[tokio::test]
    async fn test_sqlite_wal_mode_disabled_by_default() {
        let db = setup_test_db().await;
        let mode = db.get_journal_mode().await.unwrap();
        assert_ne!(mode.to_lowercase(), "wal", "default should not use WAL mode");
    }

    #[test]
    fn test_build_connection_url() {
        let mut config = shipyard_types::DatabaseConfig::default();
        config.connection_string = "/tmp/db.sqlite".to_string();
        assert_eq!(
            ShipyardDb::build_connection_url(&config).unwrap(),
            "sqlite:/tmp/db.sqlite?mode=rwc"
        );

        config.db_type = "postgres".to_string();
        config.connection_string = "postgres://u:p@h/db".to_string();
        assert_eq!(
            ShipyardDb::build_connection_url(&config).unwrap(),
            "postgres://u:p@h/db"
        );

        config.db_type = "mysql".to_string();
        assert!(ShipyardDb::build_connection_url(&config).is_err());
    }
}
