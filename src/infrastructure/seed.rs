use crate::entities::{prelude::*, tags};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::info;
use uuid::Uuid;

/// System tags: `(name, color)`.
const SYSTEM_TAGS: &[(&str, &str)] = &[(tags::FOLDER_TAG, "#f0ad4e")];

pub async fn seed_system_tags(db: &DatabaseConnection) -> anyhow::Result<()> {
    for (name, color) in SYSTEM_TAGS {
        let existing = Tags::find()
            .filter(tags::Column::Name.eq(*name))
            .filter(tags::Column::IsSystem.eq(true))
            .one(db)
            .await?;

        if existing.is_none() {
            tags::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                name: Set(name.to_string()),
                color: Set(Some(color.to_string())),
                user_id: Set(None),
                is_system: Set(true),
                created_at: Set(Some(Utc::now())),
            }
            .insert(db)
            .await?;
            info!("🌱 Seeded system tag {}", name);
        }
    }
    Ok(())
}
