//! Integration tests for the prompt library backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

const PROVIDER_SECRET: &str = "gateway-secret";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            search_debounce: Duration::from_millis(20),
            default_limit: None,
            provider_secret: Some(PROVIDER_SECRET.to_string()),
            filter_session_idle: Duration::from_secs(60),
            max_filter_sessions: 100,
        };

        let app = create_router(AppState::new(repo, config));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register an account and return its session token.
    async fn register(&self, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "password": "Corr3ct-horse",
                "displayName": "Test User"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn create_prompt(&self, token: &str, prompt: Value) -> Value {
        let resp = self
            .client
            .post(self.url("/api/prompts"))
            .bearer_auth(token)
            .json(&prompt)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn get_json(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    /// POST a provider profile, optionally with the gateway secret.
    async fn provider_sign_in(&self, profile: &Value, secret: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url("/api/auth/provider")).json(profile);
        if let Some(secret) = secret {
            req = req.header("x-provider-secret", secret);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}

fn prompt_body(title: &str, tags: &[&str], is_public: bool) -> Value {
    json!({
        "title": title,
        "description": format!("About {}", title),
        "content": format!("You are {}.", title),
        "tags": tags,
        "category": "Assistant",
        "isPublic": is_public
    })
}

fn titles(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_register_sign_in_and_me() {
    let fixture = TestFixture::new().await;
    fixture.register("ada@example.com").await;

    let (status, body) = fixture
        .post_json(
            "/api/auth/sign-in",
            None,
            json!({"email": "ADA@example.com", "password": "Corr3ct-horse"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = fixture.get_json("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["favoritePrompts"], json!([]));

    let (status, body) = fixture
        .post_json(
            "/api/auth/sign-in",
            None,
            json!({"email": "ada@example.com", "password": "wrong"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_missing_or_stale_session_is_401() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = fixture
        .post_json("/api/prompts", None, prompt_body("Anon", &["Template"], true))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = fixture.register("ada@example.com").await;
    let (status, _) = fixture
        .post_json("/api/auth/sign-out", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = fixture.get_json("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_prompt_crud_is_author_only() {
    let fixture = TestFixture::new().await;
    let author = fixture.register("author@example.com").await;
    let other = fixture.register("other@example.com").await;

    let prompt = fixture
        .create_prompt(&author, prompt_body("Reviewer", &["Coding", "Rust"], true))
        .await;
    let id = prompt["id"].as_str().unwrap().to_string();
    assert_eq!(prompt["favoriteCount"], 0);
    assert_eq!(prompt["tags"], json!(["Coding", "Rust"]));

    // Another user can read but not change it.
    let (status, _) = fixture
        .get_json(&format!("/api/prompts/{}", id), Some(&other))
        .await;
    assert_eq!(status, StatusCode::OK);

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/prompts/{}", id)))
        .bearer_auth(&other)
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/prompts/{}", id)))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The author can.
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/prompts/{}", id)))
        .bearer_auth(&author)
        .json(&json!({"title": "Senior Reviewer"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Senior Reviewer");
    assert_eq!(body["data"]["content"], "You are Reviewer.");

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/prompts/{}", id)))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = fixture
        .get_json(&format!("/api/prompts/{}", id), Some(&author))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_private_prompts_are_hidden_from_others() {
    let fixture = TestFixture::new().await;
    let author = fixture.register("author@example.com").await;
    let other = fixture.register("other@example.com").await;

    let private = fixture
        .create_prompt(&author, prompt_body("Secret", &["Template"], false))
        .await;
    fixture
        .create_prompt(&author, prompt_body("Shared", &["Template"], true))
        .await;
    let path = format!("/api/prompts/{}", private["id"].as_str().unwrap());

    assert_eq!(fixture.get_json(&path, Some(&author)).await.0, StatusCode::OK);
    assert_eq!(fixture.get_json(&path, Some(&other)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(fixture.get_json(&path, None).await.0, StatusCode::NOT_FOUND);

    let (_, body) = fixture.get_json("/api/prompts/public", None).await;
    assert_eq!(titles(&body), vec!["Shared"]);

    let (_, body) = fixture.get_json("/api/prompts/library", Some(&author)).await;
    assert_eq!(titles(&body).len(), 2);

    let (_, body) = fixture.get_json("/api/prompts/library", Some(&other)).await;
    assert!(titles(&body).is_empty());
}

#[tokio::test]
async fn test_invalid_prompt_is_400() {
    let fixture = TestFixture::new().await;
    let token = fixture.register("author@example.com").await;

    for body in [
        prompt_body("   ", &["Template"], true),
        prompt_body("No tags", &[], true),
        prompt_body("Odd tag", &["Not A Real Tag"], true),
        json!({"title": "Empty", "content": "", "tags": ["Template"]}),
    ] {
        let (status, resp) = fixture.post_json("/api/prompts", Some(&token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_toggle_favorite_round_trip() {
    let fixture = TestFixture::new().await;
    let author = fixture.register("author@example.com").await;
    let fan = fixture.register("fan@example.com").await;

    let prompt = fixture
        .create_prompt(&author, prompt_body("Beloved", &["Template"], true))
        .await;
    let id = prompt["id"].as_str().unwrap().to_string();
    let toggle = format!("/api/favorites/{}/toggle", id);

    let (status, body) = fixture.post_json(&toggle, Some(&fan), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"isFavorite": true, "favoriteCount": 1}));

    let (_, body) = fixture
        .get_json(&format!("/api/favorites/{}", id), Some(&fan))
        .await;
    assert_eq!(body["data"], json!({"isFavorite": true, "favoriteCount": 1}));

    let (_, body) = fixture
        .post_json(
            "/api/favorites/check",
            Some(&fan),
            json!({"promptIds": [id, "unknown"]}),
        )
        .await;
    assert_eq!(body["data"][&id], true);
    assert_eq!(body["data"]["unknown"], false);

    let (_, body) = fixture.get_json("/api/favorites", Some(&fan)).await;
    assert_eq!(titles(&body), vec!["Beloved"]);

    let (_, body) = fixture.post_json(&toggle, Some(&fan), json!({})).await;
    assert_eq!(body["data"], json!({"isFavorite": false, "favoriteCount": 0}));

    let (status, _) = fixture
        .post_json("/api/favorites/missing/toggle", Some(&fan), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_prompt_leaves_no_favorites_behind() {
    let fixture = TestFixture::new().await;
    let author = fixture.register("author@example.com").await;
    let fan = fixture.register("fan@example.com").await;

    let prompt = fixture
        .create_prompt(&author, prompt_body("Fleeting", &["Template"], true))
        .await;
    let id = prompt["id"].as_str().unwrap().to_string();
    fixture
        .post_json(&format!("/api/favorites/{}/toggle", id), Some(&fan), json!({}))
        .await;

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/prompts/{}", id)))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, body) = fixture.get_json("/api/auth/me", Some(&fan)).await;
    assert_eq!(body["data"]["favoritePrompts"], json!([]));

    let (_, body) = fixture.get_json("/api/favorites", Some(&fan)).await;
    assert!(titles(&body).is_empty());
}

#[tokio::test]
async fn test_filter_actions_drive_public_listing() {
    let fixture = TestFixture::new().await;
    let author = fixture.register("author@example.com").await;
    fixture
        .create_prompt(&author, prompt_body("Borrow checker", &["Rust"], true))
        .await;
    fixture
        .create_prompt(&author, prompt_body("Async tutor", &["Rust", "Educational"], true))
        .await;
    fixture
        .create_prompt(&author, prompt_body("Snake charmer", &["Python"], true))
        .await;

    let client_id = "browser-tab-1";
    let dispatch = |action: Value| {
        fixture
            .client
            .post(fixture.url("/api/filter/actions"))
            .header("x-client-id", client_id)
            .json(&action)
            .send()
    };
    let list = || {
        fixture
            .client
            .get(fixture.url("/api/prompts/public"))
            .header("x-client-id", client_id)
            .send()
    };

    let resp = dispatch(json!({"type": "toggleTag", "tag": "Rust"})).await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["selectedTags"], json!(["Rust"]));

    dispatch(json!({"type": "setSortField", "field": "title"}))
        .await
        .unwrap();
    dispatch(json!({"type": "setSortDirection", "direction": "asc"}))
        .await
        .unwrap();

    let body: Value = list().await.unwrap().json().await.unwrap();
    assert_eq!(titles(&body), vec!["Async tutor", "Borrow checker"]);

    // Other clients keep their own selection.
    let (_, body) = fixture.get_json("/api/prompts/public", None).await;
    assert_eq!(titles(&body).len(), 3);

    // Debounced search lands after the window.
    dispatch(json!({"type": "inputSearchQuery", "query": "borrow"}))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let body: Value = list().await.unwrap().json().await.unwrap();
    assert_eq!(titles(&body), vec!["Borrow checker"]);

    let resp = dispatch(json!({"type": "reset"})).await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["searchQuery"], "");
    assert_eq!(body["data"]["sortField"], "createdAt");

    let (_, body) = fixture
        .get_json("/api/prompts/public?limit=2", None)
        .await;
    assert_eq!(titles(&body).len(), 2);
}

#[tokio::test]
async fn test_library_sorts_favorites_first() {
    let fixture = TestFixture::new().await;
    let author = fixture.register("author@example.com").await;

    let older = fixture
        .create_prompt(&author, prompt_body("Older", &["Template"], false))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    fixture
        .create_prompt(&author, prompt_body("Newer", &["Template"], false))
        .await;

    let (_, body) = fixture.get_json("/api/prompts/library", Some(&author)).await;
    assert_eq!(titles(&body), vec!["Newer", "Older"]);

    fixture
        .post_json(
            &format!("/api/favorites/{}/toggle", older["id"].as_str().unwrap()),
            Some(&author),
            json!({}),
        )
        .await;

    let (_, body) = fixture.get_json("/api/prompts/library", Some(&author)).await;
    assert_eq!(titles(&body), vec!["Older", "Newer"]);
}

#[tokio::test]
async fn test_password_reset_endpoints() {
    let fixture = TestFixture::new().await;
    fixture.register("ada@example.com").await;

    // Unknown and known addresses answer the same way.
    for email in ["ada@example.com", "nobody@example.com"] {
        let (status, body) = fixture
            .post_json("/api/auth/password-reset", None, json!({"email": email}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    let (status, body) = fixture
        .post_json(
            "/api/auth/password-reset/confirm",
            None,
            json!({"token": "bogus", "newPassword": "N3w-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_provider_sign_in() {
    let fixture = TestFixture::new().await;
    let profile = json!({
        "provider": "github",
        "subject": "12345",
        "email": "octo@example.com",
        "displayName": "Octo Cat"
    });

    let (status, first) = fixture
        .provider_sign_in(&profile, Some(PROVIDER_SECRET))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = fixture
        .provider_sign_in(&profile, Some(PROVIDER_SECRET))
        .await;
    assert_eq!(first["data"]["user"]["id"], second["data"]["user"]["id"]);
    assert_eq!(first["data"]["user"]["displayName"], "Octo Cat");
}

#[tokio::test]
async fn test_provider_sign_in_cannot_take_over_accounts() {
    let fixture = TestFixture::new().await;
    let owner = fixture.register("owner@example.com").await;
    fixture
        .create_prompt(&owner, prompt_body("Secret", &["Template"], false))
        .await;

    let claim = json!({
        "provider": "evil",
        "subject": "x",
        "email": "owner@example.com"
    });

    // Without the gateway secret the profile is not trusted at all.
    let (status, body) = fixture.provider_sign_in(&claim, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["data"].is_null());
    let (status, _) = fixture.provider_sign_in(&claim, Some("guess")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Even a vouched-for profile cannot claim a registered address.
    let (status, body) = fixture
        .provider_sign_in(&claim, Some(PROVIDER_SECRET))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
    assert!(body["data"]["token"].is_null());

    let (status, body) = fixture.get_json("/api/prompts/library", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Secret"]);
}
