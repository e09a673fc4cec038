mod helpers;

use chrono::{Duration, Utc};
use helpers::setup_test_app;
use reels_core::models::{Video, VideoStatus};
use uuid::Uuid;

fn seed(app: &helpers::TestApp, status: VideoStatus, minutes_ago: i64) -> Video {
    let id = Uuid::new_v4();
    let mut video = Video::new_pending(id, Uuid::new_v4(), None, format!("raw/{}/{}.mp4", id, id));
    video.status = status;
    video.created_at = Utc::now() - Duration::minutes(minutes_ago);
    video.updated_at = video.created_at;
    if status == VideoStatus::Ready {
        video.processed_object_key = Some(format!("processed/{}/720p.mp4", id));
        video.cover_object_key = Some(format!("processed/{}/cover.jpg", id));
    }
    app.videos.seed(video.clone());
    video
}

#[tokio::test]
async fn test_feed_lists_ready_videos_newest_first() {
    let app = setup_test_app().await;
    let old = seed(&app, VideoStatus::Ready, 30);
    let new = seed(&app, VideoStatus::Ready, 1);
    seed(&app, VideoStatus::Pending, 0);
    seed(&app, VideoStatus::Processing, 0);
    seed(&app, VideoStatus::Failed, 0);

    let response = app.client().get("/feed").await;
    assert_eq!(response.status_code(), 200);

    let data: serde_json::Value = response.json();
    assert_eq!(data["total"], 2);
    assert_eq!(data["limit"], 20);
    assert_eq!(data["offset"], 0);
    let items = data["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], new.id.to_string());
    assert_eq!(items[1]["id"], old.id.to_string());
}

#[tokio::test]
async fn test_feed_pagination() {
    let app = setup_test_app().await;
    for minutes_ago in 0..5 {
        seed(&app, VideoStatus::Ready, minutes_ago);
    }

    let data: serde_json::Value = app.client().get("/feed?limit=2&offset=4").await.json();
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["total"], 5);

    let data: serde_json::Value = app.client().get("/feed?offset=10").await.json();
    assert!(data["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_feed_clamps_limit_and_offset() {
    let app = setup_test_app().await;

    let data: serde_json::Value = app.client().get("/feed?limit=500&offset=-3").await.json();
    assert_eq!(data["limit"], 50);
    assert_eq!(data["offset"], 0);

    let data: serde_json::Value = app.client().get("/feed?limit=0").await.json();
    assert_eq!(data["limit"], 1);
}

#[tokio::test]
async fn test_feed_rejects_non_numeric_limit() {
    let app = setup_test_app().await;

    let response = app.client().get("/feed?limit=lots").await;
    assert_eq!(response.status_code(), 400);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_get_video_is_public() {
    let app = setup_test_app().await;
    let video = seed(&app, VideoStatus::Processing, 0);

    let response = app.client().get(&format!("/videos/{}", video.id)).await;
    assert_eq!(response.status_code(), 200);
    let data: serde_json::Value = response.json();
    assert_eq!(data["status"], "processing");
    assert_eq!(data["user_id"], video.user_id.to_string());
}

#[tokio::test]
async fn test_get_video_unknown_and_malformed_ids() {
    let app = setup_test_app().await;

    let response = app.client().get(&format!("/videos/{}", Uuid::new_v4())).await;
    assert_eq!(response.status_code(), 404);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "video_not_found");

    let response = app.client().get("/videos/not-a-uuid").await;
    assert_eq!(response.status_code(), 400);
    let data: serde_json::Value = response.json();
    assert_eq!(data["error"]["code"], "validation_error");
}
