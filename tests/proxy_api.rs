use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use image_edge_proxy::{backend::mock::MockBackend, build_app, state::AppState};
use serde_json::Value;
use tower::util::ServiceExt;

fn one_shot_app() -> axum::Router {
    build_app(AppState::new(Arc::new(MockBackend::default())))
}

fn two_phase_app() -> axum::Router {
    build_app(AppState::new(Arc::new(MockBackend::two_phase())))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn healthz_responds_ok() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_render() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn preflight_returns_204_with_cors() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/")
                .body(Body::from("ignored body"))
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_MAX_AGE)
            .and_then(|value| value.to_str().ok()),
        Some("86400")
    );
}

#[tokio::test]
async fn missing_prompt_is_a_200_error_envelope() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Prompt is required");
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn invalid_json_body_is_a_200_error_envelope() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn unsupported_method_gets_405() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/")
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Method not allowed");
}

#[tokio::test]
async fn one_shot_submit_completes_with_data_uri() {
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a red fox"}"#))
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["provider"], "mock");
    assert!(json["imageUrl"]
        .as_str()
        .unwrap_or_default()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn poll_without_request_id_is_a_200_error_envelope() {
    let response = two_phase_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["error"], "requestId query parameter is required");
}

#[tokio::test]
async fn two_phase_flow_submits_polls_and_completes() {
    let app = two_phase_app();

    let submit = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a red fox"}"#))
                .expect("request build"),
        )
        .await
        .expect("submit execution");
    assert_eq!(submit.status(), StatusCode::OK);
    let submit_json = body_json(submit).await;
    assert_eq!(submit_json["status"], "submitted");
    let request_id = submit_json["requestId"]
        .as_str()
        .expect("submit should return a job token")
        .to_owned();
    assert_eq!(request_id, "abc123");

    let first_poll = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/?requestId={request_id}"))
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("first poll execution");
    assert_eq!(first_poll.status(), StatusCode::OK);
    let processing = body_json(first_poll).await;
    assert_eq!(processing["status"], "processing");
    assert_eq!(processing["queuePosition"], 3);
    assert_eq!(processing["waitTime"], 12);
    assert_eq!(processing["done"], false);

    let second_poll = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/?requestId={request_id}"))
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("second poll execution");
    assert_eq!(second_poll.status(), StatusCode::OK);
    let completed = body_json(second_poll).await;
    assert_eq!(completed["status"], "completed");
    assert!(completed["imageUrl"]
        .as_str()
        .unwrap_or_default()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn backend_failures_are_data_not_transport_errors() {
    // One-shot mock rejects polling; the envelope still comes back 200.
    let response = one_shot_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/?requestId=whatever")
                .body(Body::empty())
                .expect("request build"),
        )
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert!(json["error"]
        .as_str()
        .unwrap_or_default()
        .contains("does not support status polling"));
}
