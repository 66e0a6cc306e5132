use crate::e2e::helpers;

use helpers::provider_mocks::{mp3_frames, ELEVENLABS_PATH, OPENAI_PATH};
use helpers::{
    article, generate_test_jwt, sign_session, TestContext, MAX_TEXT_CHARS, TEST_SESSION_SECRET,
};
use hyper::StatusCode;
use serde_json::json;
use std::time::Duration;
use test_context::test_context;
use uuid::Uuid;

const ENGLISH: &str = "The quick brown fox jumps over the lazy dog near the river bank.";

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_synthesize_and_download_audio(ctx: &TestContext) {
    ctx.providers.primary_returns_audio(3).await;
    let token = ctx.client.open_session().await;

    let accepted = ctx
        .client
        .submit_job(&token, &json!({ "text": ENGLISH, "title": "Rivers of Europe" }))
        .await
        .expect_status(StatusCode::ACCEPTED)
        .json();
    assert_eq!(accepted["title"], "Rivers of Europe");
    assert_eq!(accepted["source"], "full");
    assert_eq!(accepted["voice"]["voice"], "alloy");
    assert!(accepted.get("session_id").is_none());

    let job_id = accepted["id"].as_str().unwrap();
    let job = ctx.client.wait_until_finished(&token, job_id).await;

    assert_eq!(job["state"], "ready", "job failed: {:?}", job["failure"]);
    assert_eq!(job["result"]["segment_count"], 1);
    assert_eq!(job["result"]["providers"]["fell_back"], false);
    assert_eq!(job["notices"], json!([]));

    let download = ctx.client.download(&token, job_id).await;
    assert_eq!(download.audio, mp3_frames(3));
    assert_eq!(download.segment_count, 1);
    assert!(!download.fell_back);
    assert!(download.duration_seconds > 0.0);
    assert!(download
        .content_disposition
        .starts_with("attachment; filename=\"Rivers_of_Europe_"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_split_long_text_into_ordered_segments(ctx: &TestContext) {
    ctx.providers.primary_returns_audio(2).await;
    let token = ctx.client.open_session().await;

    // about 5,600 characters against a 2,500 character primary limit
    let job_id = ctx
        .client
        .start_job(&token, &json!({ "text": article(100), "title": "Long read" }))
        .await;
    let job = ctx.client.wait_until_finished(&token, &job_id).await;

    assert_eq!(job["state"], "ready", "job failed: {:?}", job["failure"]);
    assert_eq!(job["result"]["segment_count"], 3);
    assert_eq!(job["progress"]["completed_segments"], 3);
    assert_eq!(ctx.providers.request_count(ELEVENLABS_PATH).await, 3);

    let download = ctx.client.download(&token, &job_id).await;
    assert_eq!(download.segment_count, 3);
    assert_eq!(download.audio, mp3_frames(6));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fall_back_when_primary_rejects_credentials(ctx: &TestContext) {
    ctx.providers
        .primary_fails(401, json!({ "detail": { "status": "invalid_api_key" } }))
        .await;
    ctx.providers.fallback_returns_audio(2).await;
    let token = ctx.client.open_session().await;

    let job_id = ctx.client.start_job(&token, &json!({ "text": ENGLISH })).await;
    let job = ctx.client.wait_until_finished(&token, &job_id).await;

    assert_eq!(job["state"], "ready", "job failed: {:?}", job["failure"]);
    assert_eq!(job["notices"], json!(["fell back to secondary voice"]));
    assert_eq!(job["result"]["providers"]["fell_back"], true);
    assert_eq!(job["result"]["providers"]["fallback_segments"], 1);
    assert_eq!(job["result"]["providers"]["primary_segments"], 0);

    // authentication is not retried
    assert_eq!(ctx.providers.request_count(ELEVENLABS_PATH).await, 1);
    assert_eq!(ctx.providers.request_count(OPENAI_PATH).await, 1);

    let download = ctx.client.download(&token, &job_id).await;
    assert!(download.fell_back);
    assert_eq!(download.audio, mp3_frames(2));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fail_without_fallback_when_primary_stays_unavailable(ctx: &TestContext) {
    ctx.providers
        .primary_fails(503, json!({ "detail": "service unavailable" }))
        .await;
    ctx.providers.fallback_returns_audio(2).await;
    let token = ctx.client.open_session().await;

    let job_id = ctx
        .client
        .start_job(&token, &json!({ "text": "Hello there." }))
        .await;
    let job = ctx.client.wait_until_finished(&token, &job_id).await;

    assert_eq!(job["state"], "failed");
    assert_eq!(job["failure"]["kind"], "transient");
    assert_eq!(job["failure"]["provider"], "elevenlabs");
    assert!(job.get("result").is_none());

    assert_eq!(ctx.providers.request_count(ELEVENLABS_PATH).await, 3);
    assert_eq!(ctx.providers.request_count(OPENAI_PATH).await, 0);

    ctx.client
        .audio(&token, &job_id)
        .await
        .expect_status(StatusCode::CONFLICT)
        .expect_message("Job failed");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fail_when_fallback_also_fails(ctx: &TestContext) {
    ctx.providers
        .primary_fails(402, json!({ "detail": { "status": "quota_exceeded" } }))
        .await;
    ctx.providers
        .fallback_fails(401, json!({ "error": { "message": "Incorrect API key provided" } }))
        .await;
    let token = ctx.client.open_session().await;

    let job_id = ctx.client.start_job(&token, &json!({ "text": ENGLISH })).await;
    let job = ctx.client.wait_until_finished(&token, &job_id).await;

    assert_eq!(job["state"], "failed");
    assert_eq!(job["failure"]["kind"], "authentication");
    assert_eq!(job["failure"]["provider"], "openai");
    assert_eq!(job["notices"], json!(["fell back to secondary voice"]));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_enforce_the_job_cap_per_session(ctx: &TestContext) {
    ctx.providers.primary_is_slow(Duration::from_secs(30)).await;
    let token = ctx.client.open_session().await;

    let mut job_ids = Vec::new();
    for i in 0..5 {
        let body = json!({ "text": format!("Article number {}.", i) });
        job_ids.push(ctx.client.start_job(&token, &body).await);
    }
    assert_eq!(ctx.job_dirs(), 5);

    ctx.client
        .submit_job(&token, &json!({ "text": "One too many." }))
        .await
        .expect_status(StatusCode::CONFLICT)
        .expect_message("already holds 5 jobs");
    assert_eq!(ctx.job_dirs(), 5);

    // another session has its own allowance
    let other = ctx.client.open_session().await;
    ctx.client
        .start_job(&other, &json!({ "text": "Someone else." }))
        .await;

    ctx.client
        .delete_job(&token, &job_ids[0])
        .await
        .expect_status(StatusCode::NO_CONTENT);
    ctx.client
        .start_job(&token, &json!({ "text": "Room again." }))
        .await;

    let list = ctx
        .client
        .jobs(&token)
        .await
        .expect_status(StatusCode::OK)
        .json();
    assert_eq!(list["jobs"].as_array().unwrap().len(), 5);
    assert_eq!(list["limit"], 5);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_delete_jobs_idempotently(ctx: &TestContext) {
    ctx.providers.primary_returns_audio(2).await;
    let token = ctx.client.open_session().await;

    let job_id = ctx
        .client
        .start_job(&token, &json!({ "text": "Short lived." }))
        .await;
    ctx.client.wait_until_finished(&token, &job_id).await;
    assert_eq!(ctx.job_dirs(), 1);

    for _ in 0..2 {
        ctx.client
            .delete_job(&token, &job_id)
            .await
            .expect_status(StatusCode::NO_CONTENT);
    }

    assert_eq!(ctx.job_dirs(), 0);
    ctx.client
        .job(&token, &job_id)
        .await
        .expect_status(StatusCode::NOT_FOUND);
    ctx.client
        .audio(&token, &job_id)
        .await
        .expect_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_cancel_a_running_job(ctx: &TestContext) {
    ctx.providers.primary_is_slow(Duration::from_secs(30)).await;
    let token = ctx.client.open_session().await;

    let job_id = ctx
        .client
        .start_job(&token, &json!({ "text": "This will never finish." }))
        .await;
    ctx.client
        .wait_for_state(&token, &job_id, &["synthesizing"])
        .await;

    let cancelled = ctx
        .client
        .cancel_job(&token, &job_id)
        .await
        .expect_status(StatusCode::OK)
        .json();
    assert_eq!(cancelled["state"], "failed");
    assert_eq!(cancelled["failure"]["kind"], "cancelled");

    ctx.client
        .cancel_job(&token, &job_id)
        .await
        .expect_status(StatusCode::CONFLICT)
        .expect_message("already finished");
    ctx.client
        .audio(&token, &job_id)
        .await
        .expect_status(StatusCode::CONFLICT);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_hide_jobs_from_other_sessions(ctx: &TestContext) {
    ctx.providers.primary_returns_audio(2).await;
    let owner = ctx.client.open_session().await;
    let stranger = ctx.client.open_session().await;

    let job_id = ctx
        .client
        .start_job(&owner, &json!({ "text": "Private reading list." }))
        .await;
    ctx.client.wait_until_finished(&owner, &job_id).await;

    ctx.client
        .job(&stranger, &job_id)
        .await
        .expect_status(StatusCode::NOT_FOUND);
    ctx.client
        .audio(&stranger, &job_id)
        .await
        .expect_status(StatusCode::NOT_FOUND);

    // a stranger's delete succeeds but removes nothing
    ctx.client
        .delete_job(&stranger, &job_id)
        .await
        .expect_status(StatusCode::NO_CONTENT);
    ctx.client
        .job(&owner, &job_id)
        .await
        .expect_status(StatusCode::OK);

    let list = ctx.client.jobs(&stranger).await.json();
    assert_eq!(list["jobs"], json!([]));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_release_jobs_once_their_session_expires(ctx: &TestContext) {
    ctx.providers.primary_is_slow(Duration::from_secs(30)).await;

    // just past expiry but inside the validation leeway, so the job is accepted
    let lapsing = sign_session(
        &Uuid::new_v4(),
        TEST_SESSION_SECRET,
        chrono::Duration::seconds(-5),
    );
    ctx.client
        .start_job(&lapsing, &json!({ "text": "Read me later." }))
        .await;

    let current = ctx.client.open_session().await;
    let kept = ctx
        .client
        .start_job(&current, &json!({ "text": "Read me now." }))
        .await;

    for _ in 0..200 {
        if ctx.job_dirs() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(ctx.job_dirs(), 1);
    assert_eq!(ctx.client.jobs(&lapsing).await.json()["jobs"], json!([]));
    ctx.client
        .job(&current, &kept)
        .await
        .expect_status(StatusCode::OK);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_validate_job_requests(ctx: &TestContext) {
    let token = ctx.client.open_session().await;

    ctx.client
        .submit_job(&token, &json!({ "text": "   " }))
        .await
        .expect_status(StatusCode::BAD_REQUEST)
        .expect_message("Text cannot be empty");
    ctx.client
        .submit_job(&token, &json!({ "text": "a".repeat(MAX_TEXT_CHARS + 1) }))
        .await
        .expect_status(StatusCode::PAYLOAD_TOO_LARGE);
    ctx.client
        .submit_job(&token, &json!({ "text": "Hi.", "speed": 7.5 }))
        .await
        .expect_status(StatusCode::BAD_REQUEST);
    ctx.client
        .submit_job(&token, &json!({ "text": "Hi.", "voice": "rachel" }))
        .await
        .expect_status(StatusCode::BAD_REQUEST);

    assert_eq!(ctx.client.jobs(&token).await.json()["jobs"], json!([]));
    assert_eq!(ctx.job_dirs(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_apply_requested_voice_and_speed(ctx: &TestContext) {
    ctx.providers.primary_returns_audio(1).await;
    let token = ctx.client.open_session().await;

    let body = json!({ "text": "Summary text.", "source": "summary", "voice": "nova", "speed": 1.25 });
    let job = ctx
        .client
        .submit_job(&token, &body)
        .await
        .expect_status(StatusCode::ACCEPTED)
        .json();

    assert_eq!(job["voice"]["voice"], "nova");
    assert_eq!(job["voice"]["speed"], 1.25);
    assert_eq!(job["source"], "summary");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_note_non_english_text(ctx: &TestContext) {
    ctx.providers.primary_is_slow(Duration::from_secs(30)).await;
    let token = ctx.client.open_session().await;

    let body = json!({
        "text": "El rápido zorro marrón salta sobre el perro perezoso junto al río, \
                 mientras los niños juegan en el parque de la ciudad."
    });
    let job = ctx
        .client
        .submit_job(&token, &body)
        .await
        .expect_status(StatusCode::ACCEPTED)
        .json();

    let notices = job["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].as_str().unwrap().contains("Spanish"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_a_valid_session(ctx: &TestContext) {
    ctx.client
        .get("/api/jobs", None)
        .await
        .expect_status(StatusCode::UNAUTHORIZED)
        .expect_message("Missing authorization header");

    ctx.client
        .jobs("not-a-token")
        .await
        .expect_status(StatusCode::UNAUTHORIZED);

    let expired = generate_test_jwt(&Uuid::new_v4(), TEST_SESSION_SECRET, -2);
    ctx.client
        .jobs(&expired)
        .await
        .expect_status(StatusCode::UNAUTHORIZED);

    let forged = generate_test_jwt(&Uuid::new_v4(), "some-other-secret", 1);
    ctx.client
        .jobs(&forged)
        .await
        .expect_status(StatusCode::UNAUTHORIZED);
}
