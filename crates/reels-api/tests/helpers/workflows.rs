use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use super::auth::TestUser;

/// POST /videos/upload/init for an mp4 and return the JSON body.
pub async fn init_upload(client: &TestServer, user: &TestUser, filename: &str) -> Value {
    let response = client
        .post("/videos/upload/init")
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "title": "Skate park",
            "filename": filename,
            "content_type": "video/mp4",
            "size_bytes": 4096
        }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    response.json()
}

pub async fn complete_upload(client: &TestServer, user: &TestUser, video_id: &str) -> axum_test::TestResponse {
    client
        .post("/videos/upload/complete")
        .add_header("Authorization", user.bearer())
        .json(&json!({ "video_id": video_id }))
        .await
}

pub async fn get_video(client: &TestServer, video_id: Uuid) -> Value {
    let response = client.get(&format!("/videos/{}", video_id)).await;
    assert_eq!(response.status_code(), 200);
    response.json()
}
