use crate::entities::activity_logs;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    FileUpload,
    FileDownload,
    FileDelete,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let action = match self {
            Self::FileUpload => "file_upload",
            Self::FileDownload => "file_download",
            Self::FileDelete => "file_delete",
        };
        f.write_str(action)
    }
}

/// Appends entries to the activity log. Persistence is fire-and-forget; a
/// failed insert is logged and never fails the request.
#[derive(Clone)]
pub struct AuditService {
    db: DatabaseConnection,
}

impl AuditService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn log(
        &self,
        activity: ActivityType,
        user_id: &str,
        details: Value,
        ip_address: Option<String>,
    ) {
        let action = activity.to_string();

        info!(
            target: "audit",
            action = %action,
            user_id = %user_id,
            details = %details,
            "Activity recorded"
        );

        let entry = activity_logs::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            action: Set(action),
            details: Set(Some(details.to_string())),
            ip_address: Set(ip_address),
            timestamp: Set(chrono::Utc::now()),
        };
        let db = self.db.clone();

        tokio::spawn(async move {
            if let Err(e) = entry.insert(&db).await {
                error!("Failed to persist activity log: {}", e);
            }
        });
    }
}
