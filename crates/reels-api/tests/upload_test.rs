mod helpers;

use helpers::auth::{sign, test_user};
use helpers::fixtures::sample_video_bytes;
use helpers::setup_test_app;
use helpers::workflows::{complete_upload, init_upload};
use reels_core::models::VideoStatus;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_upload_init_returns_presigned_url() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = test_user();

    let data = init_upload(client, &user, "clip.mp4").await;

    let video_id: Uuid = data["video_id"].as_str().unwrap().parse().unwrap();
    let object_key = data["object_key"].as_str().unwrap();
    assert_eq!(object_key, format!("raw/{}/{}.mp4", video_id, video_id));
    assert!(data["upload_url"].as_str().unwrap().ends_with(object_key));

    let stored = app.videos.snapshot(video_id).unwrap();
    assert_eq!(stored.status, VideoStatus::Pending);
    assert_eq!(stored.user_id, user.user_id);
    assert_eq!(stored.title.as_deref(), Some("Skate park"));
}

#[tokio::test]
async fn test_upload_init_without_extension_uses_bin() {
    let app = setup_test_app().await;
    let user = test_user();

    let data = init_upload(app.client(), &user, "recording").await;
    assert!(data["object_key"].as_str().unwrap().ends_with(".bin"));
}

#[tokio::test]
async fn test_upload_init_rejects_unsupported_content_type() {
    let app = setup_test_app().await;
    let user = test_user();

    let response = app
        .client()
        .post("/videos/upload/init")
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "filename": "archive.zip",
            "content_type": "application/zip",
            "size_bytes": 100
        }))
        .await;

    assert_eq!(response.status_code(), 400);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "invalid_content_type");
    assert!(app.videos.all().is_empty());
}

#[tokio::test]
async fn test_upload_init_rejects_oversized_file() {
    let app = setup_test_app().await;
    let user = test_user();

    let response = app
        .client()
        .post("/videos/upload/init")
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "filename": "long.mp4",
            "content_type": "video/mp4",
            "size_bytes": 10_i64 * 1024 * 1024 * 1024
        }))
        .await;

    assert_eq!(response.status_code(), 400);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "file_too_large");
}

#[tokio::test]
async fn test_upload_init_rejects_malformed_body() {
    let app = setup_test_app().await;
    let user = test_user();

    let response = app
        .client()
        .post("/videos/upload/init")
        .add_header("Authorization", user.bearer())
        .json(&json!({ "filename": "clip.mp4" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_upload_init_requires_auth() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/videos/upload/init")
        .json(&json!({
            "filename": "clip.mp4",
            "content_type": "video/mp4",
            "size_bytes": 100
        }))
        .await;

    assert_eq!(response.status_code(), 401);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "auth_required");
}

#[tokio::test]
async fn test_upload_init_rejects_bad_tokens() {
    let app = setup_test_app().await;
    let user_id = Uuid::new_v4();

    for token in [
        "not-a-jwt".to_string(),
        sign(user_id, "access", "some-other-secret-that-is-also-32-chars"),
        sign(user_id, "refresh", helpers::TEST_JWT_SECRET),
    ] {
        let response = app
            .client()
            .post("/videos/upload/init")
            .add_header("Authorization", format!("Bearer {}", token))
            .json(&json!({
                "filename": "clip.mp4",
                "content_type": "video/mp4",
                "size_bytes": 100
            }))
            .await;

        assert_eq!(response.status_code(), 401);
        let data: serde_json::Value = response.json();
        assert_eq!(data["error"]["code"], "invalid_token");
    }
    assert!(app.videos.all().is_empty());
}

#[tokio::test]
async fn test_complete_without_upload_is_rejected() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = test_user();

    let data = init_upload(client, &user, "clip.mp4").await;
    let video_id = data["video_id"].as_str().unwrap();

    let response = complete_upload(client, &user, video_id).await;
    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "upload_missing");

    let id: Uuid = video_id.parse().unwrap();
    assert_eq!(app.videos.snapshot(id).unwrap().status, VideoStatus::Pending);
    assert!(app.tasks.tasks().is_empty());
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = test_user();

    let data = init_upload(client, &user, "clip.mp4").await;
    let video_id = data["video_id"].as_str().unwrap();
    app.put_object(data["object_key"].as_str().unwrap(), &sample_video_bytes());

    let first = complete_upload(client, &user, video_id).await;
    assert_eq!(first.status_code(), 200);
    let first: serde_json::Value = first.json();
    assert_eq!(first["status"], "processing");

    let second = complete_upload(client, &user, video_id).await;
    assert_eq!(second.status_code(), 200);
    let second: serde_json::Value = second.json();
    assert_eq!(second["status"], "processing");
    assert_eq!(second["updated_at"], first["updated_at"]);

    assert_eq!(app.tasks.tasks().len(), 1);
}

#[tokio::test]
async fn test_complete_by_other_user_is_forbidden() {
    let app = setup_test_app().await;
    let client = app.client();
    let owner = test_user();
    let intruder = test_user();

    let data = init_upload(client, &owner, "clip.mp4").await;
    let video_id = data["video_id"].as_str().unwrap();
    app.put_object(data["object_key"].as_str().unwrap(), &sample_video_bytes());

    let response = complete_upload(client, &intruder, video_id).await;
    assert_eq!(response.status_code(), 403);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "forbidden");
    assert!(app.tasks.tasks().is_empty());
}

#[tokio::test]
async fn test_complete_unknown_video_is_not_found() {
    let app = setup_test_app().await;
    let user = test_user();

    let response = complete_upload(app.client(), &user, &Uuid::new_v4().to_string()).await;
    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "video_not_found");
}

#[tokio::test]
async fn test_complete_rejects_malformed_video_id() {
    let app = setup_test_app().await;
    let user = test_user();

    let response = complete_upload(app.client(), &user, "not-a-uuid").await;
    assert_eq!(response.status_code(), 400);
}
