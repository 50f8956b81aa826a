//! Integration tests for ri-shop.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare the database and start the server
//! ri-shop-cli migrate && ri-shop-cli seed
//! cargo run -p ri-shop-api
//!
//! # Run integration tests
//! RISHOP_API_KEY=$(ri-shop-cli apikey) cargo test -p ri-shop-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `RISHOP_BASE_URL` - Server root (default: `http://localhost:3000`)
//! - `RISHOP_API_KEY` - A valid API key
//! - `RISHOP_DATABASE_URL` - Same database the server uses

#![allow(clippy::missing_panics_doc)]

use jsonwebtoken::{DecodingKey, Validation};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use ri_shop_api::models::RegisterRequest;
use ri_shop_api::services::{SignUpStrategy, register_account};

/// Password used for every account the tests create.
pub const PASSWORD: &str = "P@ssw0rd";

/// Server, credentials and database shared by one test.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub api_key: String,
    pub pool: PgPool,
}

impl TestContext {
    /// Read the environment and connect to the database.
    pub async fn new() -> Self {
        let base_url = std::env::var("RISHOP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_key = std::env::var("RISHOP_API_KEY").expect("RISHOP_API_KEY must be set");
        let database_url =
            std::env::var("RISHOP_DATABASE_URL").expect("RISHOP_DATABASE_URL must be set");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to database");

        Self {
            client: Client::new(),
            base_url,
            api_key,
            pool,
        }
    }

    /// Absolute URL of a `/v1` path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.base_url)
    }

    /// Request carrying the API key.
    #[must_use]
    pub fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("x-api-key", &self.api_key)
    }

    /// Register a customer through the API and return the passport.
    pub async fn sign_up_customer(&self) -> Passport {
        let suffix = unique();
        let resp = self
            .with_key(self.client.post(self.url("/users/signup")))
            .json(&json!({
                "email": format!("customer-{suffix}@rishop.dev"),
                "password": PASSWORD,
                "username": format!("customer-{suffix}"),
            }))
            .send()
            .await
            .expect("Failed to sign up customer");
        assert_eq!(resp.status(), StatusCode::CREATED);
        Passport::from(envelope(resp).await)
    }

    /// Create an admin directly in the database, then sign in through the API.
    pub async fn sign_in_admin(&self) -> Passport {
        let suffix = unique();
        let email = format!("admin-{suffix}@rishop.dev");
        register_account(
            &self.pool,
            &RegisterRequest {
                email: email.clone(),
                password: PASSWORD.to_owned(),
                username: format!("admin-{suffix}"),
            },
            SignUpStrategy::Admin,
        )
        .await
        .expect("Failed to create admin");

        let resp = self
            .with_key(self.client.post(self.url("/users/signin")))
            .json(&json!({"email": email, "password": PASSWORD}))
            .send()
            .await
            .expect("Failed to sign in admin");
        assert_eq!(resp.status(), StatusCode::OK);
        Passport::from(envelope(resp).await)
    }
}

/// The parts of a passport the tests use.
#[derive(Debug, Clone)]
pub struct Passport {
    pub user_id: String,
    pub role_id: i64,
    pub oauth_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<Value> for Passport {
    fn from(body: Value) -> Self {
        let data = &body["data"];
        let text = |v: &Value| v.as_str().unwrap_or_default().to_owned();
        Self {
            user_id: text(&data["user"]["id"]),
            role_id: data["user"]["role_id"].as_i64().unwrap_or_default(),
            oauth_id: text(&data["token"]["id"]),
            access_token: text(&data["token"]["access_token"]),
            refresh_token: text(&data["token"]["refresh_token"]),
        }
    }
}

impl Passport {
    /// Attach the access token as a bearer credential.
    #[must_use]
    pub fn bearer(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }
}

/// Short random suffix for unique emails and usernames.
#[must_use]
pub fn unique() -> String {
    Uuid::new_v4().simple().to_string().chars().take(12).collect()
}

/// Read a response body as JSON.
pub async fn envelope(resp: Response) -> Value {
    resp.json().await.expect("Failed to parse response body")
}

/// Read the payload of a JWT without checking its signature.
#[must_use]
pub fn unverified_claims(token: &str) -> Value {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .expect("Failed to decode token")
        .claims
}
