#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use nas_storage_core::config::StorageConfig;
use nas_storage_core::entities::{prelude::*, users};
use nas_storage_core::infrastructure::{database, seed};
use nas_storage_core::services::file_service::FileService;
use nas_storage_core::services::metadata_store::{
    MetadataStore, QuotaRecord, SeaOrmMetadataStore, StoredObject, TagRequest,
};
use nas_storage_core::services::storage::{LocalStorageService, StorageService};
use nas_storage_core::utils::auth::create_jwt;
use nas_storage_core::{AppState, create_app};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbErr, EntityTrait, Set};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub db: DatabaseConnection,
    pub root: TempDir,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("nas_storage_core=debug,tower_http=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn test_config(root: &Path) -> StorageConfig {
    StorageConfig {
        storage_root: root.to_path_buf(),
        uploads_per_hour: 0,
        ..StorageConfig::default()
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    seed::seed_system_tags(&db).await.unwrap();
    db
}

/// Builds the router over a fresh database and storage root; `tune` adjusts
/// the configuration before services are created.
pub async fn spawn_app_with(tune: impl FnOnce(&mut StorageConfig)) -> TestApp {
    init_tracing();

    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    tune(&mut config);

    let db = setup_test_db().await;
    let storage: Arc<dyn StorageService> = Arc::new(LocalStorageService::new(root.path()));
    let file_service = Arc::new(FileService::new(db.clone(), storage, config.clone()));

    let state = AppState {
        file_service,
        config,
    };

    TestApp {
        app: create_app(state.clone()),
        state,
        db,
        root,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

impl TestApp {
    /// Inserts a principal with the given limit and returns `(id, token)`.
    pub async fn create_principal(&self, limit: Option<i64>) -> (String, String) {
        let id = Uuid::new_v4().to_string();
        users::ActiveModel {
            id: Set(id.clone()),
            username: Set(format!("user-{}", &id[..8])),
            storage_limit: Set(limit),
            storage_used: Set(0),
            created_at: Set(Some(Utc::now())),
        }
        .insert(&self.db)
        .await
        .unwrap();

        let token = create_jwt(&id, &self.state.config.jwt_secret, 1).unwrap();
        (id, token)
    }

    pub async fn bytes_used(&self, principal: &str) -> i64 {
        Users::find_by_id(principal.to_string())
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
            .storage_used
    }

    /// A second service over the same database and root, reading and writing
    /// metadata through `store`.
    pub fn service_with(
        &self,
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageService>,
    ) -> Arc<FileService> {
        Arc::new(FileService::with_store(
            self.db.clone(),
            store,
            storage,
            self.state.config.clone(),
        ))
    }

    pub fn local_storage(&self) -> Arc<dyn StorageService> {
        Arc::new(LocalStorageService::new(self.root.path()))
    }

    pub fn principal_dir(&self, principal: &str) -> PathBuf {
        self.root.path().join("users").join(principal)
    }

    pub fn staging_dir(&self, principal: &str) -> PathBuf {
        self.root.path().join("tmp").join(principal)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn upload(&self, token: &str, filename: &str, content: &[u8]) -> Response<Body> {
        self.upload_with_fields(token, filename, content, &[]).await
    }

    pub async fn upload_with_fields(
        &self,
        token: &str,
        filename: &str,
        content: &[u8],
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        self.send(upload_request(token, filename, content, fields))
            .await
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_range(&self, uri: &str, token: &str, range: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .header("Range", range)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, id: &str, token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("/delete/{}", id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn upload_request(
    token: &str,
    filename: &str,
    content: &[u8],
    fields: &[(&str, &str)],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header("Authorization", format!("Bearer {}", token))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Polls until `check` holds, for work finished by a spawned task.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Real metadata store with switches for injecting failures and for holding
/// a lookup open while the test changes state underneath it.
pub struct HookedStore {
    inner: SeaOrmMetadataStore,
    pub fail_inserts: AtomicBool,
    pub fail_next_delete: AtomicBool,
    pub hold_next_find: AtomicBool,
    pub find_held: Notify,
    pub find_release: Notify,
}

impl HookedStore {
    pub fn new(db: DatabaseConnection) -> Arc<Self> {
        Arc::new(Self {
            inner: SeaOrmMetadataStore::new(db),
            fail_inserts: AtomicBool::new(false),
            fail_next_delete: AtomicBool::new(false),
            hold_next_find: AtomicBool::new(false),
            find_held: Notify::new(),
            find_release: Notify::new(),
        })
    }
}

#[async_trait]
impl MetadataStore for HookedStore {
    async fn quota(&self, principal: &str) -> Result<Option<QuotaRecord>, DbErr> {
        self.inner.quota(principal).await
    }

    async fn set_bytes_used(&self, principal: &str, bytes_used: u64) -> Result<(), DbErr> {
        self.inner.set_bytes_used(principal, bytes_used).await
    }

    async fn insert_object(
        &self,
        object: StoredObject,
        tags: TagRequest,
    ) -> Result<Vec<String>, DbErr> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("metadata store unavailable".to_string()));
        }
        self.inner.insert_object(object, tags).await
    }

    async fn find_object(&self, id: &str) -> Result<Option<StoredObject>, DbErr> {
        let found = self.inner.find_object(id).await?;
        if self.hold_next_find.swap(false, Ordering::SeqCst) {
            self.find_held.notify_one();
            self.find_release.notified().await;
        }
        Ok(found)
    }

    async fn delete_object(&self, id: &str, owner: &str, size: u64) -> Result<bool, DbErr> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(DbErr::Custom("quota write failed".to_string()));
        }
        self.inner.delete_object(id, owner, size).await
    }

    async fn touch_object(&self, id: &str, at: DateTime<Utc>) -> Result<(), DbErr> {
        self.inner.touch_object(id, at).await
    }

    async fn ping(&self) -> Result<(), DbErr> {
        self.inner.ping().await
    }
}
