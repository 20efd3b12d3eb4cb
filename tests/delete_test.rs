mod common;

use axum::http::StatusCode;
use common::*;
use http_body_util::BodyExt;
use nas_storage_core::config::DeletePolicy;
use nas_storage_core::services::error::StorageError;
use std::sync::atomic::Ordering;

async fn upload_id(t: &TestApp, token: &str, name: &str, content: &[u8]) -> String {
    let response = t.upload(token, name, content).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_delete_twice_releases_quota_once() {
    let t = spawn_app().await;
    let (principal, token) = t.create_principal(Some(10_000)).await;
    let keep = upload_id(&t, &token, "keep.txt", &sample(300)).await;
    let gone = upload_id(&t, &token, "gone.txt", &sample(700)).await;
    assert_eq!(t.bytes_used(&principal).await, 1000);

    let response = t.delete(&gone, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], true);
    assert_eq!(t.bytes_used(&principal).await, 300);
    assert!(!t.principal_dir(&principal).join("gone.txt").exists());

    let response = t.delete(&gone, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(t.bytes_used(&principal).await, 300);

    let response = t.get(&format!("/stream/{}", keep), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_deletes_release_once() {
    let t = spawn_app().await;
    let (principal, token) = t.create_principal(Some(10_000)).await;
    let id = upload_id(&t, &token, "twice.bin", &sample(500)).await;

    let (a, b) = tokio::join!(t.delete(&id, &token), t.delete(&id, &token));
    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();

    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::NOT_FOUND]);
    assert_eq!(t.bytes_used(&principal).await, 0);
}

#[tokio::test]
async fn test_only_owner_may_delete() {
    let t = spawn_app().await;
    let (owner, owner_token) = t.create_principal(Some(10_000)).await;
    let (_, other_token) = t.create_principal(Some(10_000)).await;
    let id = upload_id(&t, &owner_token, "mine.txt", b"mine").await;

    let response = t.delete(&id, &other_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
    assert_eq!(t.bytes_used(&owner).await, 4);
    assert!(t.principal_dir(&owner).join("mine.txt").exists());
}

#[tokio::test]
async fn test_deferred_delete_during_stream() {
    let t = spawn_app_with(|c| {
        c.delete_policy = DeletePolicy::Defer;
        c.default_chunk_size = 256;
    })
    .await;
    let (principal, token) = t.create_principal(Some(10_000)).await;
    let content = sample(1000);
    let id = upload_id(&t, &token, "movie.mp4", &content).await;
    let path = t.principal_dir(&principal).join("movie.mp4");

    // Open the stream and read the first chunk.
    let response = t.get(&format!("/stream/{}", id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();
    let mut received = body
        .frame()
        .await
        .unwrap()
        .unwrap()
        .into_data()
        .unwrap()
        .to_vec();

    let response = t.delete(&id, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.bytes_used(&principal).await, 0);
    assert!(path.exists());

    // No new readers once deletion is committed.
    let response = t.get(&format!("/stream/{}", id), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let rest = body.collect().await.unwrap().to_bytes();
    received.extend_from_slice(&rest);
    assert_eq!(received, content);

    assert!(eventually(|| !path.exists()).await);
}

#[tokio::test]
async fn test_reject_delete_during_stream() {
    let t = spawn_app_with(|c| c.delete_policy = DeletePolicy::Reject).await;
    let (principal, token) = t.create_principal(Some(10_000)).await;
    let content = sample(1000);
    let id = upload_id(&t, &token, "movie.mp4", &content).await;

    let response = t.get(&format!("/stream/{}", id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let busy = t.delete(&id, &token).await;
    assert_eq!(busy.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(busy).await["code"], "RESOURCE_BUSY");
    assert_eq!(t.bytes_used(&principal).await, 1000);

    assert_eq!(body_bytes(response).await, content);

    let response = t.delete(&id, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.bytes_used(&principal).await, 0);
    assert!(!t.principal_dir(&principal).join("movie.mp4").exists());
}

#[tokio::test]
async fn test_failed_delete_changes_nothing_and_can_be_retried() {
    let t = spawn_app().await;
    let (principal, token) = t.create_principal(Some(10_000)).await;
    let id = upload_id(&t, &token, "report.pdf", &sample(500)).await;
    let path = t.principal_dir(&principal).join("report.pdf");

    let store = HookedStore::new(t.db.clone());
    store.fail_next_delete.store(true, Ordering::SeqCst);
    let service = t.service_with(store, t.local_storage());

    let result = service.delete_object(&principal, &id, None).await;
    assert!(matches!(result, Err(StorageError::Metadata(_))));
    assert_eq!(t.bytes_used(&principal).await, 500);
    assert!(path.exists());

    let response = t.get(&format!("/stream/{}", id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;

    service.delete_object(&principal, &id, None).await.unwrap();
    assert_eq!(t.bytes_used(&principal).await, 0);
    assert!(!path.exists());

    assert!(matches!(
        service.delete_object(&principal, &id, None).await,
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(t.bytes_used(&principal).await, 0);
}
