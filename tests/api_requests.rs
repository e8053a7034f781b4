//! End-to-end request flows across several endpoints.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Duration;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use crowdfund_backend::api::{RateLimitConfig, create_router, create_router_with_rate_limit};
use crowdfund_backend::app::{AppState, TokenService};
use crowdfund_backend::domain::TransactionStatus;
use crowdfund_backend::test_utils::{MockBlobStorage, MockDatabase};

fn create_test_state(db: Arc<MockDatabase>) -> Arc<AppState> {
    let tokens = TokenService::new(
        &SecretString::from("flow-test-secret-0123456789abcdefghij"),
        Duration::hours(24),
    )
    .unwrap();
    Arc::new(AppState::new(
        db,
        Arc::new(MockBlobStorage::new()),
        tokens,
        1024 * 1024,
    ))
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_full_campaign_lifecycle_flow() {
    let db = Arc::new(MockDatabase::new());
    let router = create_router(create_test_state(Arc::clone(&db)));

    // 1. Register the campaign owner
    let (status, registered) = call(
        &router,
        json_request(
            "POST",
            "/api/v1/users",
            None,
            json!({
                "name": "Ada Lovelace",
                "occupation": "mathematician",
                "email": "ada@example.com",
                "password": "analytical-engine"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let owner_id = registered["data"]["id"].as_i64().unwrap();

    // 2. Log in again and use the fresh token from here on
    let (status, session) = call(
        &router,
        json_request(
            "POST",
            "/api/v1/sessions",
            None,
            json!({"email": "ada@example.com", "password": "analytical-engine"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["meta"]["message"], "Successfully logged in");
    let token = session["data"]["token"].as_str().unwrap().to_string();

    // 3. Create a campaign
    let (status, created) = call(
        &router,
        json_request(
            "POST",
            "/api/v1/campaigns",
            Some(&token),
            json!({
                "name": "Difference Engine",
                "short_description": "Build it",
                "description": "A mechanical calculator",
                "goal_amount": 100_000,
                "perks": "blueprint, gear"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let campaign_id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(
        created["data"]["slug"],
        format!("difference-engine-{owner_id}")
    );

    // 4. A backer pledges
    let (status, backer) = call(
        &router,
        json_request(
            "POST",
            "/api/v1/users",
            None,
            json!({
                "name": "Charles",
                "occupation": "inventor",
                "email": "charles@example.com",
                "password": "babbage-1791"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let backer_id = backer["data"]["id"].as_i64().unwrap();
    db.insert_transaction(campaign_id, backer_id, 2_500, TransactionStatus::Paid);

    // 5. The owner sees the pledge on the campaign
    let (status, pledges) = call(
        &router,
        get_request(
            &format!("/api/v1/campaigns/{campaign_id}/transactions"),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pledges["data"][0]["name"], "Charles");
    assert_eq!(pledges["data"][0]["amount"], 2_500);

    // 6. The public detail view reflects the campaign and its owner
    let (status, detail) = call(
        &router,
        get_request(&format!("/api/v1/campaigns/{campaign_id}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["data"]["user"]["name"], "Ada Lovelace");
    assert_eq!(detail["data"]["perks"], json!(["blueprint", "gear"]));

    // 7. The owner's filtered list contains exactly this campaign
    let (status, list) = call(
        &router,
        get_request(&format!("/api/v1/campaigns?user_id={owner_id}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let campaigns = list["data"].as_array().unwrap();
    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0]["id"], campaign_id);
}

#[tokio::test]
async fn test_rate_limited_requests_get_error_envelope() {
    let db = Arc::new(MockDatabase::new());
    let config = RateLimitConfig {
        general_rps: 1,
        general_burst: 2,
        ..RateLimitConfig::default()
    };
    let router = create_router_with_rate_limit(create_test_state(db), config);

    let mut statuses = Vec::new();
    let mut last = None;
    for _ in 0..3 {
        let request = Request::builder()
            .uri("/api/v1/campaigns")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        statuses.push(response.status());
        last = Some(response);
    }

    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
    let response = last.unwrap();
    assert!(response.headers().contains_key("retry-after"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["meta"]["code"], 429);
    assert_eq!(body["data"]["type"], "rate_limited");

    // Other clients keep their own quota.
    let request = Request::builder()
        .uri("/api/v1/campaigns")
        .header("x-forwarded-for", "198.51.100.1")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
