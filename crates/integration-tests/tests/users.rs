//! Sign-up, sign-in and refresh against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`ri-shop-cli migrate`)
//! - The API server running (`cargo run -p ri-shop-api`)
//! - `RISHOP_API_KEY` and `RISHOP_DATABASE_URL` in the environment

use reqwest::StatusCode;
use serde_json::json;

use ri_shop_integration_tests::{PASSWORD, Passport, TestContext, envelope, unverified_claims};

const EMAIL: &str = "a@b.co";
const USERNAME: &str = "alice";

async fn fresh_alice(ctx: &TestContext) {
    sqlx::query(r#"DELETE FROM "users" WHERE "email" = $1 OR "username" = $2"#)
        .bind(EMAIL)
        .bind(USERNAME)
        .execute(&ctx.pool)
        .await
        .expect("Failed to clear alice");
}

async fn sign_up_alice(ctx: &TestContext) -> reqwest::Response {
    ctx.with_key(ctx.client.post(ctx.url("/users/signup")))
        .json(&json!({"email": EMAIL, "password": PASSWORD, "username": USERNAME}))
        .send()
        .await
        .expect("Failed to sign up")
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_sign_up_customer_then_duplicate() {
    let ctx = TestContext::new().await;
    fresh_alice(&ctx).await;

    let resp = sign_up_alice(&ctx).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let passport = Passport::from(envelope(resp).await);
    assert_eq!(passport.role_id, 1);
    assert!(!passport.access_token.is_empty());
    assert!(!passport.refresh_token.is_empty());

    let resp = sign_up_alice(&ctx).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = envelope(resp).await;
    assert_eq!(body["error_code"], "users-001");
    assert!(
        body["message"]
            .as_str()
            .unwrap_or_default()
            .contains("email has been used")
    );
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_sign_in_then_refresh_keeps_deadline() {
    let ctx = TestContext::new().await;
    fresh_alice(&ctx).await;
    assert_eq!(sign_up_alice(&ctx).await.status(), StatusCode::CREATED);

    let resp = ctx
        .with_key(ctx.client.post(ctx.url("/users/signin")))
        .json(&json!({"email": EMAIL, "password": PASSWORD}))
        .send()
        .await
        .expect("Failed to sign in");
    assert_eq!(resp.status(), StatusCode::OK);
    let signed_in = Passport::from(envelope(resp).await);

    let resp = ctx
        .with_key(ctx.client.post(ctx.url("/users/refresh")))
        .json(&json!({"refresh_token": signed_in.refresh_token}))
        .send()
        .await
        .expect("Failed to refresh");
    assert_eq!(resp.status(), StatusCode::OK);
    let refreshed = Passport::from(envelope(resp).await);

    assert_ne!(refreshed.access_token, signed_in.access_token);
    assert_eq!(
        unverified_claims(&refreshed.refresh_token)["exp"],
        unverified_claims(&signed_in.refresh_token)["exp"]
    );

    // The old refresh token no longer names a session
    let resp = ctx
        .with_key(ctx.client.post(ctx.url("/users/refresh")))
        .json(&json!({"refresh_token": signed_in.refresh_token}))
        .send()
        .await
        .expect("Failed to refresh");
    assert!(!resp.status().is_success());
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_sign_out_invalidates_session() {
    let ctx = TestContext::new().await;
    let customer = ctx.sign_up_customer().await;

    let profile_url = ctx.url(&format!("/users/{}", customer.user_id));
    let resp = customer
        .bearer(ctx.client.get(&profile_url))
        .send()
        .await
        .expect("Failed to get profile");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .with_key(ctx.client.post(ctx.url("/users/signout")))
        .json(&json!({"oauth_id": customer.oauth_id}))
        .send()
        .await
        .expect("Failed to sign out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = customer
        .bearer(ctx.client.get(&profile_url))
        .send()
        .await
        .expect("Failed to get profile");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(resp).await["error_code"], "middleware-002");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_profile_of_someone_else_rejected() {
    let ctx = TestContext::new().await;
    let alice = ctx.sign_up_customer().await;
    let bob = ctx.sign_up_customer().await;

    let resp = alice
        .bearer(ctx.client.get(ctx.url(&format!("/users/{}", bob.user_id))))
        .send()
        .await
        .expect("Failed to get profile");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(resp).await["error_code"], "middleware-003");
}
