use crate::e2e::helpers;

use helpers::{TestContext, TEST_SECRET};
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_context::test_context;

async fn add_key(ctx: &TestContext, secret: &str) -> Value {
    let response = ctx
        .client
        .post("/api/keys", &json!({ "keys": [{ "secret": secret }] }))
        .await
        .unwrap();
    response.assert_status(StatusCode::CREATED);
    response.body.as_ref().unwrap()[0].clone()
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_keys_without_exposing_secrets(ctx: &TestContext) {
    let response = ctx.client.get("/api/keys").await.unwrap();

    response.assert_status(StatusCode::OK);

    let raw = String::from_utf8(response.body_bytes.clone()).unwrap();
    assert!(!raw.contains(TEST_SECRET));

    let keys = response.body.as_ref().unwrap().as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["label"], "primary");
    assert_eq!(keys[0]["masked_secret"], "****0001");
    assert_eq!(keys[0]["status"], "valid");
    assert_eq!(keys[0]["available"], true);
    assert_eq!(keys[0]["usage"]["rpm_used"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_add_keys_and_persist_them(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/keys",
            &json!({
                "keys": [
                    { "secret": "AIza-second-0002", "label": "second" },
                    { "secret": "AIza-third-0003", "model": "gemini-2.5-pro" }
                ]
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::CREATED);

    let added = response.body.as_ref().unwrap().as_array().unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(added[0]["label"], "second");
    assert_eq!(added[0]["status"], "unknown");
    assert_eq!(added[1]["model"], "gemini-2.5-pro");
    assert_eq!(added[1]["usage"]["rpm_limit"], 2);

    assert_eq!(ctx.stored_key_count().await, 3);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_duplicate_secrets(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/keys", &json!({ "keys": [{ "secret": TEST_SECRET }] }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_code("CONFLICT")
        .assert_error_message("0001");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_key_list(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/keys", &json!({ "keys": [] }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_code("BAD_REQUEST");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_mark_key_invalid_on_failed_validation(ctx: &TestContext) {
    let key = add_key(ctx, "invalid-secret-9999").await;
    let key_id = key["id"].as_str().unwrap();

    let response = ctx
        .client
        .post_empty(&format!("/api/keys/{}/validate", key_id))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["valid"], false);
    assert_eq!(body["key"]["status"], "invalid");
    assert!(body["error"].as_str().unwrap().contains("API key not valid"));
    assert_eq!(body["key"]["available"], false);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_validate_good_key(ctx: &TestContext) {
    let key = add_key(ctx, "AIza-fresh-4444").await;
    let key_id = key["id"].as_str().unwrap();

    let response = ctx
        .client
        .post_empty(&format!("/api/keys/{}/validate", key_id))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["key"]["status"], "valid");
    assert!(body.get("error").is_none());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_relabel_and_disable_key(ctx: &TestContext) {
    let key = add_key(ctx, "AIza-label-5555").await;
    let key_id = key["id"].as_str().unwrap();

    let response = ctx
        .client
        .patch(
            &format!("/api/keys/{}", key_id),
            &json!({ "label": "night shift", "is_active": false }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    let body = response.body.as_ref().unwrap();
    assert_eq!(body["label"], "night shift");
    assert_eq!(body["is_active"], false);
    assert_eq!(body["available"], false);
    assert_eq!(body["block_reason"], "disabled by operator");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_remove_key(ctx: &TestContext) {
    let key = add_key(ctx, "AIza-remove-6666").await;
    let key_id = key["id"].as_str().unwrap();

    ctx.client
        .delete(&format!("/api/keys/{}", key_id))
        .await
        .unwrap()
        .assert_status(StatusCode::NO_CONTENT);

    let response = ctx
        .client
        .delete(&format!("/api/keys/{}", key_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_code("NOT_FOUND");

    assert_eq!(ctx.stored_key_count().await, 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reset_keys(ctx: &TestContext) {
    let key = add_key(ctx, "invalid-reset-7777").await;
    let key_id = key["id"].as_str().unwrap();
    ctx.client
        .post_empty(&format!("/api/keys/{}/validate", key_id))
        .await
        .unwrap();

    let response = ctx
        .client
        .post_empty(&format!("/api/keys/{}/reset", key_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["status"], "unknown");

    let response = ctx.client.post_empty("/api/keys/reset").await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["reset"], 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_not_found_for_unknown_key(ctx: &TestContext) {
    let response = ctx
        .client
        .post_empty("/api/keys/00000000-0000-0000-0000-000000000000/reset")
        .await
        .unwrap();

    response.assert_status(StatusCode::NOT_FOUND);
}
