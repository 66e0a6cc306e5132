use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_ok_for_health_check(ctx: &TestContext) {
    let response = ctx
        .client
        .get("/health", None)
        .await
        .expect_status(StatusCode::OK);

    // Health endpoint returns plain text
    assert_eq!(response.text(), "OK");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_readiness_of_storage_and_providers(ctx: &TestContext) {
    let body = ctx
        .client
        .get("/health/ready", None)
        .await
        .expect_status(StatusCode::OK)
        .json();

    assert_eq!(body["status"], "ready");
    assert_eq!(body["storage"], "writable");
    assert_eq!(body["primary"], "configured");
    assert_eq!(body["fallback"], "configured");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_include_request_id_in_responses(ctx: &TestContext) {
    let response = ctx.client.get("/health", None).await;
    assert!(response.header("x-request-id").is_some());

    let response = ctx
        .client
        .get("/api/jobs", None)
        .await
        .expect_status(StatusCode::UNAUTHORIZED);
    assert!(response.header("x-request-id").is_some());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_handle_concurrent_health_checks(ctx: &TestContext) {
    let checks = (0..10).map(|_| {
        let client = ctx.client.clone();
        async move { client.get("/health", None).await }
    });

    for response in futures::future::join_all(checks).await {
        response.expect_status(StatusCode::OK);
    }
}
