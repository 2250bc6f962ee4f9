//! Upload integration tests.
//!
//! Tests verify:
//! - Accepted uploads are written, marked pending and queued
//! - Rejected uploads leave no trace
//! - Processing status follows the worker's results
//! - Body limit and queue failures

use axum::http::StatusCode;

use facematch::ProcessingResults;

use super::test_utils::{
    files_in, get, multipart_body, multipart_request, upload_request, MockImageQueue, TestApp,
};

// =============================================================================
// Accepted Uploads
// =============================================================================

#[tokio::test]
async fn test_upload_then_process_lifecycle() {
    let app = TestApp::new().await;
    let auth = app.alice().await;

    let response = app
        .send(upload_request("foo.jpg", b"0123456789", Some(&auth)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["success"], true);
    assert_eq!(response.json["img_id"], "foo");

    let stored = std::fs::read(app.input_dir().join("foo.jpg")).unwrap();
    assert_eq!(stored.len(), 10);
    assert_eq!(app.queue.sent(), vec!["foo"]);

    let status = app.send(get("/api/process_image/foo", Some(&auth))).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json["finished_processing"], false);

    let status = app.send(get("/api/upload_image/foo", Some(&auth))).await;
    assert_eq!(status.json["finished_processing"], false);
    assert_eq!(status.json["pending"], true);

    // Worker finishes
    app.db
        .record_results(ProcessingResults::new("foo").with_face("foo_0"))
        .await
        .unwrap();

    let status = app.send(get("/api/process_image/foo", Some(&auth))).await;
    assert_eq!(status.json["finished_processing"], true);

    let status = app.send(get("/api/upload_image/foo", Some(&auth))).await;
    assert_eq!(status.json["finished_processing"], true);
    assert_eq!(status.json["pending"], false);
}

#[tokio::test]
async fn test_upload_sanitizes_filename() {
    let app = TestApp::builder().without_auth().build().await;

    let response = app
        .send(upload_request("../../holiday pic.JPG", b"jpeg", None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["img_id"], "holiday_pic");

    assert_eq!(files_in(&app.input_dir()), vec!["holiday_pic.JPG"]);
    assert!(files_in(app.upload_dir.path()).iter().all(|f| f != "holiday_pic.JPG"));
}

#[tokio::test]
async fn test_duplicate_upload_keeps_one_pending_marker() {
    let app = TestApp::builder()
        .without_auth()
        .database_file()
        .build()
        .await;

    for _ in 0..2 {
        let response = app.send(upload_request("dup.jpg", b"abc", None)).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let conn = rusqlite::Connection::open(app.database_path.as_ref().unwrap()).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pending_face_images WHERE original_img_id = 'dup'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);

    // Each upload is still dispatched
    assert_eq!(app.queue.sent(), vec!["dup", "dup"]);
}

#[tokio::test]
async fn test_upload_without_immediate_queueing() {
    let app = TestApp::builder()
        .without_auth()
        .enqueue_on_upload(false)
        .build()
        .await;

    let response = app.send(upload_request("later.jpg", b"abc", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.queue.sent().is_empty());
    assert!(app.db.is_pending("later").await.unwrap());
}

// =============================================================================
// Rejected Uploads
// =============================================================================

#[tokio::test]
async fn test_disallowed_extension_writes_nothing() {
    let app = TestApp::builder().without_auth().build().await;

    let response = app.send(upload_request("notes.txt", b"hello", None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "disallowed_extension");

    assert!(files_in(&app.input_dir()).is_empty());
    assert!(app.queue.sent().is_empty());
    assert!(!app.db.is_pending("notes").await.unwrap());
}

#[tokio::test]
async fn test_missing_extension_rejected() {
    let app = TestApp::builder().without_auth().build().await;

    let response = app.send(upload_request("photo", b"hello", None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "disallowed_extension");
}

#[tokio::test]
async fn test_missing_file_field() {
    let app = TestApp::builder().without_auth().build().await;

    let body = multipart_body("image", Some("foo.jpg"), b"abc");
    let response = app.send(multipart_request(body, None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "missing_file");
    assert!(files_in(&app.input_dir()).is_empty());
}

#[tokio::test]
async fn test_missing_filename() {
    let app = TestApp::builder().without_auth().build().await;

    let body = multipart_body("file", None, b"abc");
    let response = app.send(multipart_request(body, None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "missing_file");
}

#[tokio::test]
async fn test_filename_sanitized_to_nothing() {
    let app = TestApp::builder().without_auth().build().await;

    let response = app.send(upload_request("日本.jpg", b"abc", None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "invalid_filename");
    assert!(files_in(&app.input_dir()).is_empty());
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = TestApp::builder()
        .without_auth()
        .max_upload_bytes(1024)
        .build()
        .await;

    let response = app
        .send(upload_request("big.jpg", &vec![0u8; 4096], None))
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(files_in(&app.input_dir()).is_empty());
}

#[tokio::test]
async fn test_upload_requires_credentials() {
    let app = TestApp::new().await;

    let response = app.send(upload_request("foo.jpg", b"abc", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.headers.contains_key("www-authenticate"));
    assert!(files_in(&app.input_dir()).is_empty());
}

// =============================================================================
// Queue Failures
// =============================================================================

#[tokio::test]
async fn test_queue_failure_is_server_error() {
    let app = TestApp::builder()
        .without_auth()
        .queue(MockImageQueue::failing())
        .build()
        .await;

    let response = app.send(upload_request("foo.jpg", b"abc", None)).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json["error"], "queue_error");

    // The file and marker are already in place when the push fails
    assert_eq!(files_in(&app.input_dir()), vec!["foo.jpg"]);
    assert!(app.db.is_pending("foo").await.unwrap());
}
