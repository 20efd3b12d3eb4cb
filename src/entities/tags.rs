use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Name of the system tag attached to archive uploads.
pub const FOLDER_TAG: &str = "FOLDER";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    /// Owner; `None` for system tags.
    pub user_id: Option<String>,
    #[sea_orm(default_expr = "Expr::value(false)")]
    pub is_system: bool,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::file_tags::Entity")]
    FileTags,
}

impl Related<super::file_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
