use db_migration::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

pub mod entities;
pub mod models;
pub mod types;

pub use sea_orm::{DbErr, TransactionTrait};

#[derive(Clone)]
pub struct DBService {
    pub pool: DatabaseConnection,
}

impl DBService {
    /// Connects to `database_url` and brings the schema up to date.
    pub async fn new(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_owned());
        options.sqlx_logging(false);
        if database_url.contains(":memory:") {
            // Every pooled connection to an in-memory database is a separate database.
            options.max_connections(1).min_connections(1);
        }

        let pool = Database::connect(options).await?;
        Migrator::up(&pool, None).await?;
        tracing::debug!(database_url, "database ready");
        Ok(DBService { pool })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::DatabaseConnection;

    use crate::DBService;

    pub async fn setup_db() -> DatabaseConnection {
        DBService::new("sqlite::memory:").await.unwrap().pool
    }
}
