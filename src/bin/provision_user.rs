use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use nas_storage_core::config::StorageConfig;
use nas_storage_core::entities::{prelude::*, users};
use nas_storage_core::infrastructure::database;
use nas_storage_core::utils::auth::create_jwt;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Creates or updates a principal and prints a bearer token for it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Unique username of the principal
    username: String,

    /// Storage limit in bytes (defaults to DEFAULT_STORAGE_LIMIT)
    #[arg(short, long)]
    limit: Option<u64>,

    /// Store no limit; whether that means unlimited depends on UNLIMITED_QUOTA_WHEN_UNSET
    #[arg(long, conflicts_with = "limit")]
    no_limit: bool,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    ttl_hours: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "provision_user=info,nas_storage_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StorageConfig::from_env();
    let limit = if args.no_limit {
        None
    } else {
        let bytes = args.limit.unwrap_or(config.default_storage_limit);
        Some(i64::try_from(bytes)?)
    };

    info!("🔌 Connecting to database...");
    let db = database::setup_database().await?;

    let existing = Users::find()
        .filter(users::Column::Username.eq(&args.username))
        .one(&db)
        .await?;

    let user = match existing {
        Some(user) => {
            let mut active = user.into_active_model();
            active.storage_limit = Set(limit);
            let updated = active.update(&db).await?;
            info!("🔄 Updated principal {} ({})", updated.username, updated.id);
            updated
        }
        None => {
            let created = users::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                username: Set(args.username.clone()),
                storage_limit: Set(limit),
                storage_used: Set(0),
                created_at: Set(Some(Utc::now())),
            }
            .insert(&db)
            .await?;
            info!("✅ Created principal {} ({})", created.username, created.id);
            created
        }
    };

    let token = create_jwt(&user.id, &config.jwt_secret, args.ttl_hours)?;

    println!("principal: {}", user.id);
    match user.storage_limit {
        Some(bytes) => println!("limit:     {} bytes", bytes),
        None => println!("limit:     unset"),
    }
    println!("used:      {} bytes", user.storage_used);
    println!("token:     {}", token);

    Ok(())
}
