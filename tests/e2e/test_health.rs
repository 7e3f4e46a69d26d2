use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_ok_for_health_check(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();

    response.assert_status(StatusCode::OK);

    // Health endpoint returns plain text
    let body = String::from_utf8(response.body_bytes.clone()).unwrap();
    assert_eq!(body, "OK");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_be_ready_when_a_key_is_available(ctx: &TestContext) {
    let response = ctx.client.get("/health/ready").await.unwrap();

    response.assert_status(StatusCode::OK);

    let body = response.body.as_ref().unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["keys_available"], 1);
    assert_eq!(body["keys_total"], 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_be_ready_when_every_key_is_disabled(ctx: &TestContext) {
    let keys = ctx.client.get("/api/keys").await.unwrap();
    let key_id = keys.body.as_ref().unwrap()[0]["id"].as_str().unwrap().to_string();

    ctx.client
        .patch(&format!("/api/keys/{}", key_id), &json!({ "is_active": false }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx.client.get("/health/ready").await.unwrap();
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body.as_ref().unwrap()["status"], "not_ready");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_include_request_id_in_responses(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();
    response.assert_header_exists("x-request-id");

    let response = ctx.client.get("/health/ready").await.unwrap();
    response.assert_header_exists("x-request-id");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_echo_incoming_request_id(ctx: &TestContext) {
    let response = ctx
        .client
        .get_with_header("/health", "x-request-id", "trace-abc-123")
        .await
        .unwrap();

    response.assert_header("x-request-id", "trace-abc-123");
}
