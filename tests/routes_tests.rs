// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface tests: login redirect, callback handling, API routes.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{create_test_app, features_json, get, seed_user, track_json};

#[tokio::test]
async fn test_health() {
    let app = create_test_app().await;
    let (status, body) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_redirects_with_fresh_state() {
    let app = create_test_app().await;

    let mut locations = Vec::new();
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/auth/login").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        locations.push(location);
    }

    let authorize = format!("{}/authorize?", app.spotify.uri());
    assert!(locations[0].starts_with(&authorize));
    assert!(locations[0].contains("client_id=test_client_id"));
    assert!(locations[0].contains("response_type=code"));
    assert!(locations[0].contains("state="));
    assert_ne!(locations[0], locations[1], "each login gets its own state");
}

#[tokio::test]
async fn test_callback_without_code_is_rejected() {
    let app = create_test_app().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/auth/callback?state=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_parameter");
    assert_eq!(app.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_callback_with_denied_access_is_rejected() {
    let app = create_test_app().await;

    let (status, _) = get(&app.router, "/auth/callback?error=access_denied&state=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_callback_with_forged_state_is_rejected() {
    let app = create_test_app().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/auth/callback?code=abc&state=forged").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(app.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_login_then_callback_stores_account() {
    let app = create_test_app().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "first_access",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "first_refresh"
        })))
        .expect(1)
        .mount(&app.spotify)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "alice", "display_name": "Alice"})),
        )
        .expect(1)
        .mount(&app.spotify)
        .await;

    // Take the state from a real login redirect
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/auth/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location
        .split('&')
        .find_map(|pair| pair.strip_prefix("state="))
        .unwrap()
        .to_string();

    let (status, body) = get(
        &app.router,
        &format!("/auth/callback?code=auth_code&state={}", state),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "auth success");
    assert_eq!(body["external_user_id"], "alice");

    let stored = app.state.db.get_user("alice").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "first_access");
    assert_eq!(stored.refresh_token, "first_refresh");
}

#[tokio::test]
async fn test_callback_exchange_failure_is_bad_gateway() {
    let app = create_test_app().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/auth/callback?code=abc").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "spotify_error");
    assert_eq!(app.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_me_requires_user_id() {
    let app = create_test_app().await;
    let (status, body) = get(&app.router, "/api/me").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_parameter");
}

#[tokio::test]
async fn test_me_unknown_user() {
    let app = create_test_app().await;
    let (status, body) = get(&app.router, "/api/me?external_user_id=nobody").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_me_returns_profile_after_refresh() {
    let app = create_test_app().await;
    seed_user(&app.state.db, "alice", "old_access", Utc::now() - Duration::seconds(1)).await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new_access",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&app.spotify)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(wiremock::matchers::header("authorization", "Bearer new_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "alice",
            "display_name": "Alice",
            "country": "SE"
        })))
        .expect(1)
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/api/me?spotify_user_id=alice").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "alice");
    assert_eq!(body["country"], "SE");
}

#[tokio::test]
async fn test_me_with_revoked_refresh_token_is_unauthorized() {
    let app = create_test_app().await;
    seed_user(&app.state.db, "alice", "old_access", Utc::now() - Duration::seconds(1)).await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/api/me?external_user_id=alice").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "spotify_unauthorized");
}

#[tokio::test]
async fn test_top_tracks_unknown_user() {
    let app = create_test_app().await;
    let (status, _) = get(&app.router, "/api/top-tracks?external_user_id=nobody").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_top_tracks_reports_fetched_count() {
    let app = create_test_app().await;
    seed_user(&app.state.db, "alice", "access", Utc::now() + Duration::hours(1)).await;

    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .and(wiremock::matchers::query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track_json("t1", "One"), track_json("t2", "Two")]
        })))
        .expect(1)
        .mount(&app.spotify)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audio_features": [features_json("t1", 0.2), features_json("t2", 0.4)]
        })))
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/api/top-tracks?external_user_id=alice&limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"fetched": 2}));
    assert_eq!(app.state.db.count_catalog_items().await.unwrap(), 2);
}

#[tokio::test]
async fn test_top_tracks_survives_feature_outage() {
    let app = create_test_app().await;
    let user = seed_user(&app.state.db, "alice", "access", Utc::now() + Duration::hours(1)).await;

    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track_json("t1", "One"), track_json("t2", "Two"), track_json("t3", "Three")]
        })))
        .mount(&app.spotify)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(ResponseTemplate::new(403).set_body_string("restricted"))
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/api/top-tracks?external_user_id=alice").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"fetched": 3}));
    assert_eq!(app.state.db.ranking_entries(user.id).await.unwrap().len(), 3);
    let item = app.state.db.get_catalog_item("t1").await.unwrap().unwrap();
    assert!(item.features().is_none());
}

#[tokio::test]
async fn test_top_tracks_retry_after_rejection_records_one_ranking() {
    let app = create_test_app().await;
    let user = seed_user(&app.state.db, "alice", "old_access", Utc::now() + Duration::hours(1)).await;

    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .and(wiremock::matchers::header("authorization", "Bearer old_access"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .expect(1)
        .mount(&app.spotify)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new_access",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&app.spotify)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .and(wiremock::matchers::header("authorization", "Bearer new_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [track_json("t1", "One"), track_json("t2", "Two"), track_json("t3", "Three")]
        })))
        .expect(1)
        .mount(&app.spotify)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/audio-features"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audio_features": []})))
        .mount(&app.spotify)
        .await;

    let (status, body) = get(&app.router, "/api/top-tracks?external_user_id=alice").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"fetched": 3}));

    let entries = app.state.db.ranking_entries(user.id).await.unwrap();
    let ranks: Vec<i64> = entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(app.state.db.count_catalog_items().await.unwrap(), 3);
}
