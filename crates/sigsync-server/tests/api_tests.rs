//! Router tests for the sigsync API

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sigsync::{
    FileKeyValueStore, MemoryRemoteStore, RemoteError, RemoteReadiness, SyncConfig,
    SyncCoordinator,
};
use sigsync_server::{AppState, ServerConfig, create_router};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    remote: Arc<MemoryRemoteStore>,
    _dir: TempDir,
}

async fn create_test_app() -> TestApp {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Signature editor</h1>").unwrap();

    let remote = Arc::new(MemoryRemoteStore::new());
    let coordinator = SyncCoordinator::create(
        FileKeyValueStore::new(dir.path().join("data")).unwrap(),
        RemoteReadiness::ready(remote.clone()),
        SyncConfig::default()
            .with_probe_attempts(1, Duration::ZERO)
            .with_ready_timeout(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    let config = ServerConfig {
        data_dir: dir.path().join("data"),
        static_dir: dir.path().to_path_buf(),
        ..ServerConfig::default()
    };
    let router = create_router(AppState {
        coordinator,
        config,
    });

    TestApp {
        router,
        remote,
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        (status, serde_json::from_str(&body).unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app().await;
    let (status, body) = app.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_save_and_list_while_online() {
    let app = create_test_app().await;

    let (status, body) = app
        .post_json(
            "/api/templates",
            json!({"name": "sig1", "content": "<b>hi</b>", "tags": ["de"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["synced"], true);
    assert_eq!(body["status"], "Template saved");
    assert_eq!(body["data"]["category"], "default");

    let (status, body) = app.get_json("/api/templates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Templates loaded");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(app.remote.row("sig1").unwrap().tags, vec!["de".to_string()]);
}

#[tokio::test]
async fn test_offline_save_is_queued_and_flushed_on_demand() {
    let app = create_test_app().await;
    app.remote.set_online(false);

    let (status, body) = app
        .post_json("/api/templates", json!({"name": "sig1", "content": "<b>hi</b>"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["synced"], false);
    assert_eq!(body["status"], "Saved locally only");

    let (_, sync) = app.get_json("/api/sync").await;
    assert_eq!(sync["connectivity"], "offline");
    assert_eq!(sync["pending"], 1);

    let (_, body) = app.get_json("/api/templates/sig1").await;
    assert_eq!(body["status"], "Local version loaded");
    assert_eq!(body["data"]["content"], "<b>hi</b>");

    app.remote.set_online(true);
    let (status, sync) = app.post_json("/api/sync/flush", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sync["connectivity"], "online");
    assert_eq!(sync["pending"], 0);
    assert_eq!(sync["flush"]["applied"], 1);
    assert_eq!(app.remote.row("sig1").unwrap().content, "<b>hi</b>");
}

#[tokio::test]
async fn test_missing_template_is_not_found() {
    let app = create_test_app().await;
    let (status, body) = app.get_json("/api/templates/nowhere").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "Template not found");
    assert_eq!(body["reason"]["code"], "not_found");
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let app = create_test_app().await;
    let (status, body) = app
        .post_json("/api/templates", json!({"name": "   ", "content": "x"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_delete_template() {
    let app = create_test_app().await;
    app.post_json("/api/templates", json!({"name": "old", "content": "x"}))
        .await;

    let (status, _, body) = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/api/templates/old")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let body: Value = serde_json::from_str(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Template deleted");
    assert!(body.get("data").is_none());
    assert!(app.remote.row("old").is_none());
}

#[tokio::test]
async fn test_export_downloads_xhtml() {
    let app = create_test_app().await;
    app.post_json(
        "/api/templates",
        json!({"name": "sig1", "content": "<p>Regards</p>"}),
    )
    .await;

    let (status, headers, body) = app
        .send(
            Request::builder()
                .uri("/api/templates/sig1/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"sig1.html\""
    );
    assert!(body.contains("<title>sig1</title>"));
    assert!(body.contains("<p>Regards</p>"));

    let (status, _, _) = app
        .send(
            Request::builder()
                .uri("/api/templates/missing/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preview_wraps_fragment() {
    let app = create_test_app().await;
    let (status, headers, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/preview")
                .header("content-type", "application/json")
                .body(Body::from(json!({"content": "<b>hi</b>"}).to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(body.contains("<body><b>hi</b></body>"));

    let (_, starter) = app.get_json("/api/preview/starter").await;
    assert!(starter["content"].as_str().unwrap().contains("Your Name"));
}

#[tokio::test]
async fn test_permanent_rejection_is_listed() {
    let app = create_test_app().await;
    app.remote
        .fail_for("bad", RemoteError::Rejected("value too long".into()));

    let (_, body) = app
        .post_json("/api/templates", json!({"name": "bad", "content": "x"}))
        .await;
    assert_eq!(body["synced"], false);

    let (_, sync) = app.get_json("/api/sync").await;
    assert_eq!(sync["pending"], 0);
    assert_eq!(sync["rejected"], 1);

    let (_, rejected) = app.get_json("/api/sync/rejected").await;
    assert_eq!(rejected["entries"][0]["entry"]["action"], "save");
    assert!(
        rejected["entries"][0]["reason"]
            .as_str()
            .unwrap()
            .contains("value too long")
    );
}

#[tokio::test]
async fn test_static_files_are_served() {
    let app = create_test_app().await;
    let (status, _, body) = app
        .send(
            Request::builder()
                .uri("/index.html")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Signature editor"));
}
