use crate::entities::{prelude::*, *};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::collections::BTreeSet;

pub type StoredObject = stored_objects::Model;

/// Persisted quota fields of one principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRecord {
    pub bytes_used: u64,
    /// `None` when no limit has been assigned.
    pub bytes_allowed: Option<u64>,
}

/// Tags to attach when an object is committed.
#[derive(Debug, Clone, Default)]
pub struct TagRequest {
    /// Tag ids chosen by the uploader; kept only if owned by them or system-wide.
    pub requested: Vec<String>,
    /// System tag names attached regardless of the request, e.g. `FOLDER`.
    pub system: Vec<&'static str>,
}

/// Narrow view of the metadata database used by the storage core.
///
/// Every call is atomic at record level.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn quota(&self, principal: &str) -> Result<Option<QuotaRecord>, DbErr>;

    async fn set_bytes_used(&self, principal: &str, bytes_used: u64) -> Result<(), DbErr>;

    /// Inserts the object and its tag associations in one transaction.
    /// Returns the ids of the tags actually attached.
    async fn insert_object(
        &self,
        object: StoredObject,
        tags: TagRequest,
    ) -> Result<Vec<String>, DbErr>;

    async fn find_object(&self, id: &str) -> Result<Option<StoredObject>, DbErr>;

    /// Removes the record and subtracts `size` from the owner's usage in one
    /// transaction. Returns `true` only for the call that actually removed the
    /// record; otherwise nothing changes.
    async fn delete_object(&self, id: &str, owner: &str, size: u64) -> Result<bool, DbErr>;

    async fn touch_object(&self, id: &str, at: DateTime<Utc>) -> Result<(), DbErr>;

    async fn ping(&self) -> Result<(), DbErr>;
}

pub struct SeaOrmMetadataStore {
    db: DatabaseConnection,
}

impl SeaOrmMetadataStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_active(object: &StoredObject) -> stored_objects::ActiveModel {
    stored_objects::ActiveModel {
        id: Set(object.id.clone()),
        user_id: Set(object.user_id.clone()),
        display_name: Set(object.display_name.clone()),
        storage_name: Set(object.storage_name.clone()),
        size: Set(object.size),
        category: Set(object.category.clone()),
        location: Set(object.location.clone()),
        is_public: Set(object.is_public),
        created_at: Set(object.created_at),
        last_accessed: Set(object.last_accessed),
    }
}

#[async_trait]
impl MetadataStore for SeaOrmMetadataStore {
    async fn quota(&self, principal: &str) -> Result<Option<QuotaRecord>, DbErr> {
        let user = Users::find_by_id(principal.to_string()).one(&self.db).await?;

        Ok(user.map(|u| QuotaRecord {
            bytes_used: u.storage_used.max(0) as u64,
            bytes_allowed: u.storage_limit.map(|l| l.max(0) as u64),
        }))
    }

    async fn set_bytes_used(&self, principal: &str, bytes_used: u64) -> Result<(), DbErr> {
        let value = i64::try_from(bytes_used)
            .map_err(|_| DbErr::Custom(format!("storage_used overflow: {}", bytes_used)))?;

        let res = Users::update_many()
            .col_expr(users::Column::StorageUsed, Expr::value(value))
            .filter(users::Column::Id.eq(principal))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            return Err(DbErr::RecordNotFound(format!("user {}", principal)));
        }
        Ok(())
    }

    async fn insert_object(
        &self,
        object: StoredObject,
        tags: TagRequest,
    ) -> Result<Vec<String>, DbErr> {
        let txn = self.db.begin().await?;

        to_active(&object).insert(&txn).await?;

        let mut tag_ids = BTreeSet::new();

        if !tags.requested.is_empty() {
            let allowed = Tags::find()
                .filter(tags::Column::Id.is_in(tags.requested.clone()))
                .filter(
                    Condition::any()
                        .add(tags::Column::UserId.eq(object.user_id.clone()))
                        .add(tags::Column::IsSystem.eq(true)),
                )
                .all(&txn)
                .await?;
            tag_ids.extend(allowed.into_iter().map(|t| t.id));
        }

        if !tags.system.is_empty() {
            let system = Tags::find()
                .filter(tags::Column::Name.is_in(tags.system.iter().copied()))
                .filter(tags::Column::IsSystem.eq(true))
                .all(&txn)
                .await?;
            tag_ids.extend(system.into_iter().map(|t| t.id));
        }

        for tag_id in &tag_ids {
            file_tags::ActiveModel {
                stored_object_id: Set(object.id.clone()),
                tag_id: Set(tag_id.clone()),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        Ok(tag_ids.into_iter().collect())
    }

    async fn find_object(&self, id: &str) -> Result<Option<StoredObject>, DbErr> {
        StoredObjects::find_by_id(id.to_string()).one(&self.db).await
    }

    async fn delete_object(&self, id: &str, owner: &str, size: u64) -> Result<bool, DbErr> {
        let txn = self.db.begin().await?;

        FileTags::delete_many()
            .filter(file_tags::Column::StoredObjectId.eq(id))
            .exec(&txn)
            .await?;
        let res = StoredObjects::delete_by_id(id.to_string())
            .exec(&txn)
            .await?;
        if res.rows_affected != 1 {
            // Dropping the transaction rolls back the tag cleanup.
            return Ok(false);
        }

        let user = Users::find_by_id(owner.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {}", owner)))?;
        let bytes_used = (user.storage_used.max(0) as u64).saturating_sub(size);

        Users::update_many()
            .col_expr(users::Column::StorageUsed, Expr::value(bytes_used as i64))
            .filter(users::Column::Id.eq(owner))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn touch_object(&self, id: &str, at: DateTime<Utc>) -> Result<(), DbErr> {
        StoredObjects::update_many()
            .col_expr(stored_objects::Column::LastAccessed, Expr::value(at))
            .filter(stored_objects::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbErr> {
        self.db.ping().await
    }
}
