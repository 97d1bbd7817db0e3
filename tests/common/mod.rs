// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use mood_companion::config::{Config, SpotifyConfig};
use mood_companion::db::SqliteDb;
use mood_companion::models::{TokenUpdate, UserAccount};
use mood_companion::routes::create_router;
use mood_companion::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

/// Router, shared state and the mock standing in for both Spotify hosts.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub spotify: MockServer,
}

/// Create a test app backed by an in-memory database and a mock Spotify.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let spotify = MockServer::start().await;

    let mut config = Config::test_default();
    config.spotify = SpotifyConfig::for_base_url(&spotify.uri());

    let db = SqliteDb::in_memory()
        .await
        .expect("Failed to open in-memory database");
    let state = Arc::new(AppState::new(config, db));

    TestApp {
        router: create_router(state.clone()),
        state,
        spotify,
    }
}

/// Insert a connected user whose access token expires at `expires_at`.
#[allow(dead_code)]
pub async fn seed_user(
    db: &SqliteDb,
    spotify_user_id: &str,
    access_token: &str,
    expires_at: DateTime<Utc>,
) -> UserAccount {
    db.upsert_authorized_user(
        spotify_user_id,
        Some("Test User"),
        &TokenUpdate {
            access_token: access_token.to_string(),
            refresh_token: Some("stored_refresh".to_string()),
            expires_at,
        },
    )
    .await
    .expect("Failed to seed user")
}

/// `Authorization` header value the client must send to the token endpoint.
#[allow(dead_code)]
pub fn expected_basic_auth() -> String {
    format!(
        "Basic {}",
        BASE64.encode("test_client_id:test_client_secret")
    )
}

/// Minimal track object as it appears in `/me/top/tracks`.
#[allow(dead_code)]
pub fn track_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": [{"name": "Artist One"}, {"name": "Artist Two"}],
        "album": {"name": format!("{} Album", name)}
    })
}

/// Audio-feature record for a track.
#[allow(dead_code)]
pub fn features_json(id: &str, energy: f64) -> Value {
    json!({"id": id, "energy": energy, "danceability": 0.5, "tempo": 120.0})
}

/// Issue a GET against the router and decode the JSON body (Null if empty).
#[allow(dead_code)]
pub async fn get(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}
