// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for connected Spotify users.

use crate::error::{AppError, Result};
use crate::models::UserAccount;
use crate::services::ingest::DEFAULT_TOP_TRACKS_LIMIT;
use crate::services::spotify::{TimeRange, UserProfile};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/top-tracks", get(get_top_tracks))
}

/// Look up a connected user, or 404.
async fn load_user(state: &AppState, external_user_id: Option<String>) -> Result<UserAccount> {
    let id = external_user_id.ok_or(AppError::MissingParameter("external_user_id"))?;
    state
        .db
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}

// ─── User Profile ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserQuery {
    #[serde(default, alias = "spotify_user_id")]
    external_user_id: Option<String>,
}

/// Current Spotify profile of a connected user.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserProfile>> {
    let user = load_user(&state, query.external_user_id).await?;

    let client = &state.spotify;
    let profile = state
        .tokens
        .with_token(&user, move |token| async move {
            client.get_profile(&token).await
        })
        .await?;

    Ok(Json(profile))
}

// ─── Top Tracks ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TopTracksQuery {
    #[serde(default, alias = "spotify_user_id")]
    external_user_id: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    time_range: Option<TimeRange>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopTracksResponse {
    pub fetched: usize,
}

/// Fetch and store the user's top tracks.
async fn get_top_tracks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopTracksQuery>,
) -> Result<Json<TopTracksResponse>> {
    let user = load_user(&state, query.external_user_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_TRACKS_LIMIT);
    let time_range = query.time_range.unwrap_or_default();

    let ingestor = &state.ingestor;
    let account = &user;
    let report = state
        .tokens
        .with_token(&user, move |token| async move {
            ingestor.ingest(&token, account, limit, time_range).await
        })
        .await?;

    Ok(Json(TopTracksResponse {
        fetched: report.fetched,
    }))
}
