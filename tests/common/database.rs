//! Test database setup
#![allow(dead_code)]

use featuregate::app_config::DatabaseConfig;
use featuregate::db::{connect, create_schema};
use sea_orm::{DatabaseConnection, DbErr};

/// Fresh in-memory database with the schema created from the entities.
/// Every call returns an isolated database, so tests never share rows.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    let db = connect(&config).await?;
    create_schema(&db).await?;
    Ok(db)
}
