//! Integration tests for the HTTP API
//!
//! Drives the router with `tower::ServiceExt::oneshot`; no listener is bound.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{aggregator, standard_readers, FixtureReader};
use finca_progress::types::{SourceError, SourceKind};
use finca_progress::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn standard_app(max_batch_size: usize) -> (Router, AppState) {
    let (parcel, construction, deeds) = standard_readers();
    let state = AppState::new(aggregator(parcel, construction, deeds), max_batch_size);
    (build_router(state.clone()), state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = standard_app(10);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "finca-progress");
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_case_progress_endpoint() {
    let (app, _) = standard_app(10);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/fincas/B/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["caseId"], "B");
    assert_eq!(
        body["progress"],
        json!({"completedCount": 2, "totalCount": 4, "percentage": 50})
    );
    assert_eq!(body["stages"]["ficha_campo"]["completed"], true);
    assert_eq!(body["stages"]["acta_justiprecio"]["completed"], true);
    assert_eq!(body["stages"]["acta_previa"], json!({"completed": false}));
    assert!(body.get("sourceFailures").is_none());
}

#[tokio::test]
async fn test_source_failure_recorded_for_health() {
    let deeds = FixtureReader::new(SourceKind::Deed).failing_for("X", SourceError::Status(500));
    let state = AppState::new(
        aggregator(
            Arc::new(FixtureReader::new(SourceKind::ParcelSurvey)),
            Arc::new(FixtureReader::new(SourceKind::ConstructionSurvey)),
            Arc::new(deeds),
        ),
        10,
    );
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/fincas/X/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["progress"]["percentage"], 0);
    assert_eq!(body["sourceFailures"][0]["source"], "deed");

    let health = body_json(
        app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    let last_error = health["last_error"].as_str().unwrap();
    assert!(last_error.contains("deed read failed for finca X"));
    assert!(state.last_error.read().await.is_some());
}

#[tokio::test]
async fn test_batch_progress_endpoint() {
    let (app, _) = standard_app(10);

    let response = app
        .oneshot(post_json(
            "/fincas/progress",
            json!({"finca_ids": ["A", "B", "C", "A"]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let progress = body["progress"].as_object().unwrap();
    assert_eq!(progress.len(), 3);
    assert_eq!(progress["A"]["percentage"], 100);
    assert_eq!(progress["B"]["percentage"], 50);
    assert_eq!(progress["C"]["percentage"], 0);
}

#[tokio::test]
async fn test_batch_source_failure_recorded_for_health() {
    let deeds = FixtureReader::new(SourceKind::Deed).failing_for("X", SourceError::Status(503));
    let state = AppState::new(
        aggregator(
            Arc::new(FixtureReader::new(SourceKind::ParcelSurvey)),
            Arc::new(FixtureReader::new(SourceKind::ConstructionSurvey)),
            Arc::new(deeds),
        ),
        10,
    );
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(post_json("/fincas/progress", json!({"finca_ids": ["X"]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["progress"]["X"]["percentage"], 0);

    let health = body_json(
        app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(
        health["last_error"],
        "deed read failed for finca X: Upstream returned status 503"
    );
    assert!(state.last_error.read().await.is_some());
}

#[tokio::test]
async fn test_empty_batch_returns_empty_map() {
    let (app, _) = standard_app(10);

    let response = app
        .oneshot(post_json("/fincas/progress", json!({"finca_ids": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"progress": {}}));
}

#[tokio::test]
async fn test_batch_rejects_blank_id() {
    let (app, _) = standard_app(10);

    let response = app
        .oneshot(post_json("/fincas/progress", json!({"finca_ids": ["A", "  "]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_batch_rejects_oversized_request() {
    let (app, _) = standard_app(2);

    let response = app
        .oneshot(post_json("/fincas/progress", json!({"finca_ids": ["A", "B", "C"]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("At most 2 finca ids"));
}

#[tokio::test]
async fn test_stages_endpoint_lists_registry() {
    let (app, _) = standard_app(10);

    let response = app
        .oneshot(Request::builder().uri("/stages").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let stages = body.as_array().unwrap();
    assert_eq!(stages.len(), 5);
    assert_eq!(stages[0]["key"], "ficha_campo");
    assert_eq!(stages[4]["key"], "acta_comparecencia");
    assert_eq!(stages[4]["counted"], false);
}
