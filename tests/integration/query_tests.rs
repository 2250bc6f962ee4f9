//! Query endpoint integration tests.
//!
//! The worker's output is seeded directly through `record_results`.

use axum::http::StatusCode;
use serde_json::json;

use facematch::{FaceMatch, ProcessingResults};

use super::test_utils::{get, TestApp};

/// Two photos sharing one person:
/// - `party` has faces `party_0`, `party_1` (`party_0` recorded twice)
/// - `beach` has face `beach_0`, which matches `party_0`
/// - `party_1` also matches `party_0` inside the same photo
async fn seeded_app() -> TestApp {
    let app = TestApp::builder().without_auth().build().await;

    app.db
        .record_results(
            ProcessingResults::new("party")
                .with_face("party_0")
                .with_face("party_0")
                .with_face("party_1")
                .with_match(FaceMatch::new("party_1", "party_0", 0.6)),
        )
        .await
        .unwrap();

    app.db
        .record_results(
            ProcessingResults::new("beach")
                .with_face("beach_0")
                .with_match(FaceMatch::new("beach_0", "party_0", 0.25)),
        )
        .await
        .unwrap();

    app
}

fn sorted(value: &serde_json::Value) -> Vec<String> {
    let mut ids: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_original_images_lists_processed() {
    let app = seeded_app().await;

    let response = app.send(get("/api/original_images", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json, json!({ "imgs": ["beach", "party"] }));
}

#[tokio::test]
async fn test_originals_for_crop() {
    let app = seeded_app().await;

    let response = app.send(get("/api/original_images/party_0", None)).await;
    assert_eq!(response.json, json!({ "imgs": ["party"] }));

    let response = app.send(get("/api/original_images/unknown", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json, json!({ "imgs": [] }));
}

#[tokio::test]
async fn test_cropped_images_deduplicated() {
    let app = seeded_app().await;

    let response = app.send(get("/api/cropped_images/party", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(sorted(&response.json["imgs"]), vec!["party_0", "party_1"]);
}

#[tokio::test]
async fn test_cropped_image_matches_both_directions() {
    let app = seeded_app().await;

    let response = app.send(get("/api/cropped_image_matches/beach_0", None)).await;
    assert_eq!(
        response.json,
        json!({ "imgs": ["party_0"], "distances": [0.25] })
    );

    let response = app.send(get("/api/cropped_image_matches/party_0", None)).await;
    let imgs = response.json["imgs"].as_array().unwrap();
    let distances = response.json["distances"].as_array().unwrap();
    assert_eq!(imgs.len(), 2);
    assert_eq!(distances.len(), 2);
    assert_eq!(sorted(&response.json["imgs"]), vec!["beach_0", "party_1"]);
}

#[tokio::test]
async fn test_original_image_matches_exclude_self() {
    let app = seeded_app().await;

    let response = app.send(get("/api/original_image_matches/party", None)).await;
    assert_eq!(
        response.json,
        json!({ "imgs": ["beach"], "distances": [0.25] })
    );

    let response = app.send(get("/api/original_image_matches/beach", None)).await;
    assert_eq!(
        response.json,
        json!({ "imgs": ["party"], "distances": [0.25] })
    );
}

#[tokio::test]
async fn test_unknown_ids_return_empty_lists() {
    let app = seeded_app().await;

    for uri in [
        "/api/cropped_images/nope",
        "/api/cropped_image_matches/nope",
        "/api/original_image_matches/nope",
    ] {
        let response = app.send(get(uri, None)).await;
        assert_eq!(response.status, StatusCode::OK, "{}", uri);
        assert!(response.json["imgs"].as_array().unwrap().is_empty(), "{}", uri);
    }
}
