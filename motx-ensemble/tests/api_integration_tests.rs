//! Integration tests for the HTTP API

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt;

use motx_ensemble::build_router;
use motx_ensemble::config::ServiceConfig;
use motx_ensemble::types::Field;

fn app(state: motx_ensemble::AppState) -> Router {
    build_router(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let registry = MockRegistry::new(RegistryBehaviour::NotFound);
    let state = app_state(agreeing_backends(0.9), lookup(&registry));

    let (status, body) = send(app(state), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "motx-ensemble");
    assert_eq!(body["backends_available"], 3);
    assert_eq!(body["registry_configured"], true);
}

#[tokio::test]
async fn test_health_degraded_without_backends() {
    let (status, body) = send(app(app_state(Vec::new(), None)), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["registry_configured"], false);
}

#[tokio::test]
async fn test_extract_success() {
    let registry = MockRegistry::new(RegistryBehaviour::Found(matching_vehicle()));
    let state = app_state(agreeing_backends(0.95), lookup(&registry));

    let request = post_json("/extract", json!({ "image_base64": png_base64() }));
    let (status, body) = send(app(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["request_id"].is_string());
    assert_eq!(body["extracted_data"]["registration"], "AB12 CDE");
    assert_eq!(body["extracted_data"]["make"], "FORD");
    assert_eq!(body["software_detected"], "GarageHive");
    assert_eq!(body["models_used"].as_array().unwrap().len(), 3);
    assert_eq!(body["requires_manual_review"], false);
    assert_eq!(body["validation_results"]["registry_match"], true);
    assert_eq!(registry.calls(), 1);
}

#[tokio::test]
async fn test_extract_without_registry_check() {
    let registry = MockRegistry::new(RegistryBehaviour::Found(matching_vehicle()));
    let state = app_state(agreeing_backends(0.95), lookup(&registry));

    let request = post_json(
        "/extract",
        json!({ "image_base64": png_base64(), "validate_with_registry": false }),
    );
    let (status, body) = send(app(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["registry_validation"].is_null());
    assert_eq!(registry.calls(), 0);
}

#[tokio::test]
async fn test_extract_rejects_bad_image() {
    let state = app_state(agreeing_backends(0.95), None);

    let request = post_json("/extract", json!({ "image_base64": "%%%" }));
    let (status, body) = send(app(state.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let text = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"not an image");
    let request = post_json("/extract", json!({ "image_base64": text }));
    let (status, _) = send(app(state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn small_image_limit_state() -> motx_ensemble::AppState {
    let mut config = ServiceConfig::default();
    config.limits.max_image_bytes = 100_000;
    app_state_with_config(agreeing_backends(0.95), None, config)
}

#[tokio::test]
async fn test_extract_oversized_image_is_json_bad_request() {
    let request = post_json("/extract", json!({ "image_base64": png_base64_of_len(200_000) }));
    let (status, body) = send(app(small_image_limit_state()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Image too large"));
}

#[tokio::test]
async fn test_extract_body_over_limit_is_json_bad_request() {
    let request = post_json("/extract", json!({ "image_base64": png_base64_of_len(1_000_000) }));
    let (status, body) = send(app(small_image_limit_state()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_extract_image_at_limit_is_accepted() {
    let request = post_json("/extract", json!({ "image_base64": png_base64_of_len(100_000) }));
    let (status, body) = send(app(small_image_limit_state()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_fuse_malformed_body_is_json_bad_request() {
    let request = post_json("/fuse", json!({ "results": "not a list" }));
    let (status, body) = send(app(app_state(Vec::new(), None)), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_extract_timeout_is_gateway_timeout() {
    let backends = vec![MockBackend::returning(full_result(GPT, 0.9))
        .with_delay(Duration::from_secs(30))
        .shared()];
    let state = motx_ensemble::AppState::new(
        pipeline(backends, None, Duration::from_millis(50)),
        Default::default(),
    );

    let request = post_json("/extract", json!({ "image_base64": png_base64() }));
    let (status, body) = send(app(state), request).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "TIMEOUT");
}

#[tokio::test]
async fn test_extract_all_backends_failing() {
    let state = app_state(vec![MockBackend::failing(GPT).shared()], None);

    let request = post_json("/extract", json!({ "image_base64": png_base64() }));
    let (status, body) = send(app(state), request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "NO_SUCCESSFUL_EXTRACTIONS");
}

#[tokio::test]
async fn test_fuse_endpoint() {
    let state = app_state(Vec::new(), None);
    let results = vec![
        result_with(CLAUDE, &[(Field::Registration, "AB12CDE", 0.9)]),
        result_with(GPT, &[(Field::Registration, "AB12 CDE", 0.85)]),
        result_with(GEMINI, &[(Field::Registration, "AB12COE", 0.4)]),
    ];

    let request = post_json("/fuse", json!({ "results": results }));
    let (status, body) = send(app(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_extraction"]["registration"], "AB12CDE");
    assert_eq!(body["final_extraction"]["model_name"], "ENSEMBLE");
    assert_eq!(body["requires_manual_review"], true);
    assert_eq!(
        body["field_details"]["registration"]["conflicts"][0]["competing_value"],
        "AB12COE"
    );
}

#[tokio::test]
async fn test_fuse_registry_check_without_registration_comparison() {
    let state = app_state(Vec::new(), None);
    let results: Vec<_> = [CLAUDE, GPT, GEMINI]
        .into_iter()
        .map(|name| full_result(name, 0.95))
        .collect();

    let request = post_json(
        "/fuse",
        json!({
            "results": results,
            "registry_check": { "is_valid": true, "field_matches": {} }
        }),
    );
    let (status, body) = send(app(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requires_manual_review"], false);
    assert_eq!(body["validation_results"]["registry_match"], true);
}

#[tokio::test]
async fn test_fuse_rejects_empty_results() {
    let state = app_state(Vec::new(), None);
    let (status, _) = send(app(state), post_json("/fuse", json!({ "results": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validate_registration_with_registry() {
    let registry = MockRegistry::new(RegistryBehaviour::Found(matching_vehicle()));
    let state = app_state(Vec::new(), lookup(&registry));

    let request = post_json("/validate/registration", json!({ "registration": "ab12 cde" }));
    let (status, body) = send(app(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation"]["is_valid"], true);
    assert_eq!(body["validation"]["normalized_registration"], "AB12CDE");
    assert_eq!(body["registry"]["found"], true);
    assert_eq!(body["registry"]["vehicle"]["make"], "FORD");
}

#[tokio::test]
async fn test_validate_registration_invalid_format() {
    let state = app_state(Vec::new(), None);

    let request = post_json("/validate/registration", json!({ "registration": "HELLO WORLD" }));
    let (status, body) = send(app(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation"]["is_valid"], false);
    assert!(body["registry"].is_null());
}

#[tokio::test]
async fn test_validate_date() {
    let state = app_state(Vec::new(), None);

    let (status, body) = send(
        app(state.clone()),
        post_json("/validate/date", json!({ "date": "MOT: 15/03/2025" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation"]["normalized_date"], "15/03/2025");
    assert!(body["expiry_summary"].is_string());

    let (status, body) = send(
        app(state),
        post_json("/validate/date", json!({ "date": "32/01/2025" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validation"]["is_valid"], false);
    assert!(body["expiry_summary"].is_null());
}

#[tokio::test]
async fn test_models_info() {
    let state = app_state(agreeing_backends(0.9), None);

    let (status, body) = send(app(state), get("/models/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backends"].as_array().unwrap().len(), 3);
    assert_eq!(body["backends"][0]["name"], CLAUDE);
    assert_eq!(body["model_weights"]["gpt-4o"], 0.25);
    assert_eq!(
        body["consensus_strategy"],
        "weighted_consensus_with_agreement_bonus"
    );
    assert_eq!(body["review_threshold"], 0.85);
}
