//! Database connection and schema setup

use crate::app_config::DatabaseConfig;
use crate::orm::{feature_types, features, tlos};
use once_cell::sync::OnceCell;
use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Name of the index backing the one-row-per-pairing invariant
pub const FEATURE_OWNER_UNIQUE_INDEX: &str = "idx_features_owner_feature_type";

/// Open a connection pool.
///
/// In-memory SQLite lives inside a single connection, so the pool is pinned
/// to exactly one connection that is never reaped.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.sqlx_logging(config.sqlx_logging);

    if config.url.starts_with("sqlite::memory:") || config.url.contains("mode=memory") {
        opt.max_connections(1)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(u32::MAX as u64))
            .max_lifetime(Duration::from_secs(u32::MAX as u64));
    } else {
        opt.max_connections(config.max_connections);
    }

    Database::connect(opt).await
}

/// Connect the global pool. A second call keeps the first pool.
pub async fn init_db(config: &DatabaseConfig) -> Result<(), DbErr> {
    let db = connect(config).await?;
    if DB_POOL.set(db).is_err() {
        log::warn!("Database pool was already initialized");
    }
    Ok(())
}

/// Get the global pool. Panics if `init_db` has not run.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool is not initialized")
}

/// Create tables for every entity plus the unique (owner, feature type) index.
pub async fn create_schema<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, tlos::Entity).await?;
    create_table(db, &schema, feature_types::Entity).await?;
    create_table(db, &schema, features::Entity).await?;

    let unique_owner = Index::create()
        .name(FEATURE_OWNER_UNIQUE_INDEX)
        .table(features::Entity)
        .col(features::Column::OwnerKind)
        .col(features::Column::OwnerId)
        .col(features::Column::FeatureTypeId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&unique_owner)).await?;

    let by_type = Index::create()
        .name("idx_features_feature_type_id")
        .table(features::Entity)
        .col(features::Column::FeatureTypeId)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&by_type)).await?;

    log::info!("Schema created on {:?}", backend);
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
