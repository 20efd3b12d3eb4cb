use crate::entities::{activity_logs, file_tags, stored_objects, tags, users};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://storage.db?mode=rwc".to_string());

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;
    crate::infrastructure::seed::seed_system_tags(&db).await?;

    Ok(db)
}

/// Creates every table from the entity definitions if it does not exist yet.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running SeaORM auto-migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(users::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(stored_objects::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(tags::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(file_tags::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(activity_logs::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        db.execute(builder.build(&stmt)).await?;
    }

    let owner_index = Index::create()
        .name("idx_stored_objects_user_id")
        .table(stored_objects::Entity)
        .col(stored_objects::Column::UserId)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&owner_index)).await?;

    Ok(())
}
