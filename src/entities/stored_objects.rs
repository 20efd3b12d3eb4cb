use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stored_objects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    /// Name as uploaded, after sanitization.
    pub display_name: String,
    /// Collision-resolved name on disk.
    pub storage_name: String,
    pub size: i64,
    pub category: String,
    /// Path relative to the storage root, e.g. `users/<principal>/<storage_name>`.
    #[sea_orm(unique)]
    pub location: String,
    #[sea_orm(default_expr = "Expr::value(false)")]
    pub is_public: bool,
    pub created_at: DateTimeUtc,
    pub last_accessed: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::file_tags::Entity")]
    FileTags,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::file_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
