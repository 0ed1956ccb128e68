use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;

// Arc 包一层：DatabaseConnection 在启用 mock 特性时不可 Clone
pub type DbPool = Arc<DatabaseConnection>;

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    let mut options = ConnectOptions::new(config.url.clone());
    options.max_connections(config.max_connections);

    let pool = Database::connect(options).await?;
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool.as_ref(), None).await?;
    Ok(())
}
