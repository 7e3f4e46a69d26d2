use crate::e2e::helpers;

use helpers::fixtures::{CHUNK_SAMPLES, SAMPLE_RATE};
use helpers::TestContext;
use hyper::StatusCode;
use narration_backend::domain::audio::decode_wav;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use test_context::test_context;

async fn submit(ctx: &TestContext, body: Value) -> String {
    let response = ctx.client.post("/api/jobs", &body).await.unwrap();
    response.assert_status(StatusCode::ACCEPTED);
    response.body.as_ref().unwrap()["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn primary_key_id(ctx: &TestContext) -> String {
    let response = ctx.client.get("/api/keys").await.unwrap();
    response.body.as_ref().unwrap()[0]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_narrate_text_in_chunk_order(ctx: &TestContext) {
    let job_id = submit(
        ctx,
        json!({
            "text": "The first sentence. The second sentence. The third sentence.",
            "max_words": 3
        }),
    )
    .await;

    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "done");
    assert_eq!(job["stage"], "finished");
    assert_eq!(job["percentage"], 100);
    assert_eq!(job["total_chunks"], 3);
    assert_eq!(job["settings"]["voice"], "Kore");
    assert_eq!(job["artifact"]["format"], "wav");
    assert!(job["chunks"]
        .as_array()
        .unwrap()
        .iter()
        .all(|chunk| chunk["status"] == "done" && chunk["has_audio"] == true));

    let indices: Vec<usize> = ctx
        .synthesizer
        .calls
        .lock()
        .iter()
        .map(|(index, _)| *index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let response = ctx
        .client
        .get(&format!("/api/jobs/{}/audio", job_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav")
        .assert_header_exists("x-duration-seconds");
    assert!(response
        .header("content-disposition")
        .unwrap()
        .contains(&format!("narration-{}.wav", job_id)));

    let audio = decode_wav(&response.body_bytes).unwrap();
    assert_eq!(audio.sample_rate, SAMPLE_RATE);
    assert_eq!(audio.len(), 3 * CHUNK_SAMPLES);

    // Later chunks are louder, so the tail of the file must come from the last chunk
    let first = audio.channels[0][10];
    let last = audio.channels[0][audio.len() - 10];
    assert!(last > first);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_serve_single_chunk_audio(ctx: &TestContext) {
    let job_id = submit(
        ctx,
        json!({ "text": "One small step. One giant leap.", "max_words": 3 }),
    )
    .await;
    ctx.wait_for_job(&job_id).await;

    let response = ctx
        .client
        .get(&format!("/api/jobs/{}/chunks/1/audio", job_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/wav");
    let chunk = decode_wav(&response.body_bytes).unwrap();
    assert_eq!(chunk.len(), CHUNK_SAMPLES);

    let response = ctx
        .client
        .get(&format!("/api/jobs/{}/chunks/7/audio", job_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_code("BAD_REQUEST");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_transcode_to_mp3(ctx: &TestContext) {
    let job_id = submit(
        ctx,
        json!({ "text": "Encode this narration please.", "output_format": "mp3" }),
    )
    .await;

    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "done");
    assert_eq!(job["artifact"]["format"], "mp3");

    let response = ctx
        .client
        .get(&format!("/api/jobs/{}/audio", job_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/mpeg");
    assert!(!response.body_bytes.is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/jobs", &json!({ "text": "   \n  " }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_code("BAD_REQUEST")
        .assert_error_message("empty");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_zero_chunk_size(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/jobs", &json!({ "text": "Hello there.", "max_words": 0 }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("max_words");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_not_found_for_unknown_job(ctx: &TestContext) {
    let response = ctx
        .client
        .get("/api/jobs/00000000-0000-0000-0000-000000000000")
        .await
        .unwrap();

    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_code("NOT_FOUND");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fail_job_when_provider_rejects_text(ctx: &TestContext) {
    let job_id = submit(
        ctx,
        json!({ "text": "This is fine. REJECT this one.", "max_words": 3 }),
    )
    .await;

    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "error");
    assert_eq!(job["error"]["code"], "INVALID_REQUEST");
    assert_eq!(job["error"]["chunk_index"], 1);
    // Audio produced before the failure stays with the job
    assert_eq!(job["chunks"][0]["has_audio"], true);
    assert_eq!(job["chunks"][1]["status"], "error");
    assert_eq!(ctx.synthesizer.call_count(), 2);

    let response = ctx
        .client
        .get(&format!("/api/jobs/{}/audio", job_id))
        .await
        .unwrap();
    response
        .assert_status(StatusCode::CONFLICT)
        .assert_error_code("CONFLICT");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_resume_job_after_key_is_restored(ctx: &TestContext) {
    let key_id = primary_key_id(ctx).await;
    ctx.client
        .patch(&format!("/api/keys/{}", key_id), &json!({ "is_active": false }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let job_id = submit(ctx, json!({ "text": "Nobody can read this yet." })).await;
    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "error");
    assert_eq!(job["error"]["code"], "NO_KEY_AVAILABLE");
    assert_eq!(ctx.synthesizer.call_count(), 0);

    ctx.client
        .patch(&format!("/api/keys/{}", key_id), &json!({ "is_active": true }))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx
        .client
        .post_empty(&format!("/api/jobs/{}/resume", job_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);

    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "done");
    assert!(job.get("error").is_none());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_cancel_running_job(ctx: &TestContext) {
    let job_id = submit(
        ctx,
        json!({
            "text": "SLOW one. SLOW two. SLOW three. SLOW four.",
            "max_words": 2
        }),
    )
    .await;

    // Audio is not available while the first chunk is still synthesizing
    ctx.client
        .get(&format!("/api/jobs/{}/audio", job_id))
        .await
        .unwrap()
        .assert_status(StatusCode::CONFLICT);

    // A running job cannot be acknowledged yet
    ctx.client
        .delete(&format!("/api/jobs/{}", job_id))
        .await
        .unwrap()
        .assert_status(StatusCode::CONFLICT);

    let response = ctx
        .client
        .post_empty(&format!("/api/jobs/{}/cancel", job_id))
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job["status"], "cancelled");
    assert!(ctx.synthesizer.call_count() < 4);

    ctx.client
        .post_empty(&format!("/api/jobs/{}/cancel", job_id))
        .await
        .unwrap()
        .assert_status(StatusCode::CONFLICT);

    ctx.client
        .delete(&format!("/api/jobs/{}", job_id))
        .await
        .unwrap()
        .assert_status(StatusCode::NO_CONTENT);

    ctx.client
        .get(&format!("/api/jobs/{}", job_id))
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_clear_finished_jobs(ctx: &TestContext) {
    let first = submit(ctx, json!({ "text": "First narration." })).await;
    let second = submit(ctx, json!({ "text": "Second narration." })).await;
    ctx.wait_for_job(&first).await;
    ctx.wait_for_job(&second).await;

    let response = ctx.client.get("/api/jobs").await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap().as_array().unwrap().len(), 2);

    let response = ctx.client.delete("/api/jobs").await.unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["removed"], 2);

    let response = ctx.client.get("/api/jobs").await.unwrap();
    assert!(response.body.as_ref().unwrap().as_array().unwrap().is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_stream_job_events(ctx: &TestContext) {
    let client = ctx.client.clone();
    let reader = tokio::spawn(async move {
        client
            .read_events("/api/jobs/events", 64, Duration::from_secs(2))
            .await
            .unwrap()
    });

    // Give the subscriber time to attach before anything is published
    tokio::time::sleep(Duration::from_millis(100)).await;
    let job_id = submit(ctx, json!({ "text": "Tell me when it is done." })).await;
    ctx.wait_for_job(&job_id).await;

    let events = reader.await.unwrap();
    let kinds: Vec<&str> = events
        .iter()
        .map(|event| event["type"].as_str().unwrap())
        .collect();

    assert_eq!(kinds.first(), Some(&"queued"));
    assert!(kinds.contains(&"chunk_completed"));
    assert_eq!(kinds.last(), Some(&"done"));
    assert!(events.iter().all(|event| event["job_id"] == job_id.as_str()));

    let done = events.last().unwrap();
    assert_eq!(done["progress"]["status"], "done");
    assert_eq!(done["progress"]["percentage"], 100);
}
