use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn apply_endpoint_returns_pending_application_envelope() {
    let harness = harness();
    let request = seed_request(&harness, Some(afternoon_window()));
    let router = workflow_router(&harness);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/replacements/{}/applications", request.id.0),
            json!({ "applicant_id": "u-x" }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("success"), Some(&json!(true)));
    let data = payload.get("data").expect("data present");
    assert_eq!(data.get("status"), Some(&json!("pending")));
    assert_eq!(data.get("applicant_id"), Some(&json!("u-x")));
}

#[tokio::test]
async fn duplicate_application_maps_to_conflict() {
    let harness = harness();
    let request = seed_request(&harness, None);
    let router = workflow_router(&harness);
    let uri = format!("/api/v1/replacements/{}/applications", request.id.0);

    let first = router
        .clone()
        .oneshot(post_json(&uri, json!({ "applicant_id": "u-x" })))
        .await
        .expect("router dispatch");
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = router
        .oneshot(post_json(&uri, json!({ "applicant_id": "u-x" })))
        .await
        .expect("router dispatch");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = read_json_body(second).await;
    assert_eq!(payload.get("success"), Some(&json!(false)));
    assert_eq!(payload.get("error"), Some(&json!("already-applied")));
}

#[tokio::test]
async fn approve_endpoint_returns_assignment_receipt() {
    let harness = harness();
    let request = seed_request(&harness, None);
    let application = harness
        .manager
        .apply(&request.id, &user("u-x"))
        .expect("application accepted");
    let router = workflow_router(&harness);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/applications/{}/approve", application.id.0),
            json!({ "actor_id": "u-chief", "acting_role": "lieutenant" }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("success"), Some(&json!(true)));
    let data = payload.get("data").expect("data present");
    assert_eq!(
        data.pointer("/request/status"),
        Some(&json!("assigned")),
        "request must be assigned in the receipt"
    );
    assert_eq!(data.pointer("/approved/status"), Some(&json!("approved")));
    assert_eq!(data.get("notified"), Some(&json!(true)));
}

#[tokio::test]
async fn approve_without_admin_role_is_forbidden() {
    let harness = harness();
    let request = seed_request(&harness, None);
    let application = harness
        .manager
        .apply(&request.id, &user("u-x"))
        .expect("application accepted");
    let router = workflow_router(&harness);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/applications/{}/approve", application.id.0),
            json!({ "actor_id": "u-y" }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("error"), Some(&json!("unauthorized")));
}

#[tokio::test]
async fn throttled_withdrawal_maps_to_too_many_requests() {
    let harness = harness();
    let first_request = seed_request(&harness, None);
    let second_request = seed_request(&harness, None);
    let first = harness
        .manager
        .apply(&first_request.id, &user("u-x"))
        .expect("first application accepted");
    let second = harness
        .manager
        .apply(&second_request.id, &user("u-x"))
        .expect("second application accepted");
    let router = workflow_router(&harness);

    let accepted = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/applications/{}/withdraw", first.id.0),
            json!({}),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(accepted.status(), StatusCode::OK);

    let throttled = router
        .oneshot(post_json(
            &format!("/api/v1/applications/{}/withdraw", second.id.0),
            json!({}),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    let payload = read_json_body(throttled).await;
    assert_eq!(payload.get("error"), Some(&json!("rate-limited")));
    assert!(payload
        .get("retry_after_ms")
        .and_then(Value::as_u64)
        .is_some_and(|wait| wait > 0));
}

#[tokio::test]
async fn replacement_view_includes_partial_window_and_applications() {
    let harness = harness();
    let request = seed_request(&harness, Some(afternoon_window()));
    harness
        .manager
        .apply(&request.id, &user("u-x"))
        .expect("application accepted");
    let router = workflow_router(&harness);

    let response = router
        .oneshot(get(&format!("/api/v1/replacements/{}", request.id.0)))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let data = payload.get("data").expect("data present");
    assert_eq!(data.get("is_partial"), Some(&json!(true)));
    assert_eq!(data.get("start_time"), Some(&json!("13:00:00")));
    assert_eq!(data.get("end_time"), Some(&json!("17:00:00")));
    assert_eq!(
        data.get("applications")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn unknown_replacement_view_is_not_found() {
    let harness = harness();
    let router = workflow_router(&harness);

    let response = router
        .oneshot(get("/api/v1/replacements/req-missing"))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("success"), Some(&json!(false)));
    assert_eq!(payload.get("error"), Some(&json!("not-found")));
}
