//! Schema migrations for the presence tables.
//!
//! ```no_run
//! use presence_seaorm_store::migration::{Migrator, MigratorTrait};
//!
//! # async fn example(conn: sea_orm::DatabaseConnection) -> Result<(), sea_orm::DbErr> {
//! Migrator::up(&conn, None).await?;
//! # Ok(())
//! # }
//! ```

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_active_sessions_table;
mod m20240101_000002_create_activity_logs_table;
mod m20240101_000003_create_admin_notifications_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Override the name of migration table to avoid conflicts
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("presence_seaorm_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_active_sessions_table::Migration),
            Box::new(m20240101_000002_create_activity_logs_table::Migration),
            Box::new(m20240101_000003_create_admin_notifications_table::Migration),
        ]
    }
}
