//! Queue client behaviour against a mock backend.

use std::time::Duration;

use serde_json::json;
use venc_models::{JobStatus, VideoCode, VideoMetadata};
use venc_queue::{QueueApi, QueueClient, QueueError, RetryPolicy};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> QueueClient {
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    QueueClient::new(http, format!("{}/api", server.uri())).with_retry(
        RetryPolicy::new()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(Duration::ZERO),
    )
}

#[tokio::test]
async fn test_empty_queue_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/encoding-queue/next-pending"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let job = client(&server).next_pending().await.unwrap();
    assert!(job.is_none());
}

#[tokio::test]
async fn test_next_pending_parses_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/encoding-queue/next-pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video_code": "Xy12",
            "input_file_url": "https://cdn.example.com/uploads/Xy12.mov",
            "uploaded_thumbnail_url": null,
            "encoding_options": {"resolution": "720p", "crf": "23", "unknown": true},
            "retry_count": 1,
            "max_retries": 3
        })))
        .mount(&server)
        .await;

    let job = client(&server).next_pending().await.unwrap().unwrap();
    assert_eq!(job.video_code.as_str(), "Xy12");
    assert_eq!(job.encoding_options.crf, 23);
    assert_eq!(job.retry_count, 1);
    assert!(job.seed_thumbnail_url().is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/encoding-queue/abc/processing"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .mark_processing(&VideoCode::from("abc"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(503));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/encoding-queue/abc/failed"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad payload"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .mark_failed(&VideoCode::from("abc"), "Final failure: boom")
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Status { status: 422, .. }));
    assert!(err.to_string().contains("bad payload"));
}

#[tokio::test]
async fn test_redirect_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/encoding-queue/abc/processing"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .mark_processing(&VideoCode::from("abc"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(302));
}

#[tokio::test]
async fn test_completion_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/encoding-queue/abc/completed"))
        .and(body_json(json!({"output_file_path": "videos/a/abc.mp4"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/encoding-queue/def/completed"))
        .and(body_json(json!({
            "output_file_path": "videos/d/def.mp4",
            "thumbnail_paths": ["thumbnails/d/def_thumb_1.jpg", "thumbnails/d/def_thumb_2.jpg"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client
        .mark_completed(&VideoCode::from("abc"), "videos/a/abc.mp4", &[])
        .await
        .unwrap();
    client
        .mark_completed(
            &VideoCode::from("def"),
            "videos/d/def.mp4",
            &[
                "thumbnails/d/def_thumb_1.jpg".to_string(),
                "thumbnails/d/def_thumb_2.jpg".to_string(),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_video_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/abc/metadata"))
        .and(body_json(json!({"duration": 12, "width": 1280, "height": null})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/videos/abc/activate"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let code = VideoCode::from("abc");
    let metadata = VideoMetadata::from_probe(Some(12.7), Some(1280), None);
    client.update_metadata(&code, &metadata).await.unwrap();
    client.activate_video(&code).await.unwrap();
}

#[tokio::test]
async fn test_monitoring_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/encoding-queue/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pending": 4, "processing": 1, "completed": 90, "failed": 5,
            "retryable": 2, "total": 100, "oldest_pending_age": 42
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/encoding-queue/abc/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video_code": "abc", "status": "failed", "error_message": "Final failure: x",
            "retry_count": 3
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/encoding-queue/reset-stuck"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Reset 2 stuck jobs"})),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.total, 100);
    assert!(stats.extra.contains_key("oldest_pending_age"));

    let report = client.job_status(&VideoCode::from("abc")).await.unwrap();
    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.retry_count, 3);

    assert_eq!(client.reset_stuck().await.unwrap().message, "Reset 2 stuck jobs");
}

#[tokio::test]
async fn test_probe_reports_raw_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/encoding-queue/next-pending"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client(&server).probe_next_pending().await.unwrap(), 500);
}
