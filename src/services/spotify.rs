// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Web API client.
//!
//! Handles:
//! - Authorization-code and refresh-token exchanges (Basic auth)
//! - Profile and top-track fetches (Bearer auth)
//! - Batched audio-feature lookups, which degrade to "unavailable"
//! - Track identifier normalization (raw ID, `spotify:` URI, web link)

use crate::config::SpotifyConfig;
use crate::error::AppError;
use crate::models::TokenUpdate;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scopes requested during authorization.
pub const SCOPES: &str = "user-read-private user-read-email user-top-read user-read-recently-played playlist-modify-private playlist-modify-public";

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Spotify accepts at most this many IDs per `/audio-features` request.
pub const FEATURE_BATCH_SIZE: usize = 100;

/// Upper bound Spotify enforces on `/me/top/tracks?limit=`.
pub const MAX_TOP_TRACKS: u32 = 50;

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    config: SpotifyConfig,
}

impl SpotifyClient {
    /// Create a new Spotify client from explicit configuration.
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// URL the user is sent to in order to grant access.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}&show_dialog=true",
            self.config.accounts_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Get the current user's profile.
    pub async fn get_profile(&self, access_token: &str) -> Result<UserProfile, AppError> {
        self.get_json("/me", access_token, &[]).await
    }

    /// Get the current user's top tracks, best first.
    pub async fn top_tracks(
        &self,
        access_token: &str,
        limit: u32,
        time_range: TimeRange,
    ) -> Result<TopTracksPage, AppError> {
        let limit = limit.clamp(1, MAX_TOP_TRACKS);
        self.get_json(
            "/me/top/tracks",
            access_token,
            &[
                ("limit", limit.to_string()),
                ("time_range", time_range.as_str().to_string()),
            ],
        )
        .await
    }

    /// Fetch audio features for the given tracks, 100 IDs per request.
    ///
    /// Spotify restricts this endpoint for newer applications, so any failure
    /// is reported as [`FeatureFetch::Unavailable`] instead of an error. One
    /// failed chunk makes the whole fetch unavailable; records from earlier
    /// chunks are discarded.
    pub async fn audio_features(&self, access_token: &str, track_ids: &[String]) -> FeatureFetch {
        let ids: Vec<String> = track_ids
            .iter()
            .filter_map(|id| normalize_track_id(id))
            .collect();

        let mut features = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(FEATURE_BATCH_SIZE) {
            let response: Result<AudioFeaturesResponse, AppError> = self
                .get_json(
                    "/audio-features",
                    access_token,
                    &[("ids", chunk.join(","))],
                )
                .await;

            match response {
                Ok(page) => features.extend(page.audio_features.into_iter().flatten().flatten()),
                Err(e) => {
                    tracing::warn!(error = %e, "Audio features unavailable");
                    return FeatureFetch::Unavailable(e.to_string());
                }
            }
        }

        FeatureFetch::Available(features)
    }

    /// POST to the token endpoint with client credentials as Basic auth.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let url = format!("{}/api/token", self.config.accounts_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::SpotifyRequest(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, body = %body, "Spotify token endpoint rejected request");

            // invalid_grant: refresh token revoked or code already used
            if status == 401 || (status == 400 && body.contains("invalid_grant")) {
                return Err(AppError::SpotifyUnauthorized(body));
            }
            return Err(AppError::SpotifyApi { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SpotifyRequest(format!("Failed to parse token response: {}", e)))
    }

    /// Generic GET against the Web API with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.config.api_url, path);
        tracing::debug!(url = %url, "Spotify API request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::SpotifyRequest(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();

            tracing::warn!(status, url = %url, body = %body, "Spotify API error");

            // Unauthorized - token may be expired
            if status == 401 {
                return Err(AppError::SpotifyUnauthorized(body));
            }
            return Err(AppError::SpotifyApi { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SpotifyRequest(format!("JSON parse error: {}", e)))
    }
}

/// Reduce a track reference to the bare Spotify ID.
///
/// Accepts `spotify:track:<id>`, `https://open.spotify.com/track/<id>?si=...`
/// or a raw ID. Returns `None` for blank input.
pub fn normalize_track_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let id = if trimmed.starts_with("spotify:") {
        trimmed.rsplit(':').next().unwrap_or(trimmed)
    } else if trimmed.contains("open.spotify.com")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("http://")
    {
        let path = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
        path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
    } else {
        trimmed
    };

    (!id.is_empty()).then(|| id.to_string())
}

/// Token endpoint response.
///
/// `refresh_token` is optional: Spotify does not always rotate it, and a
/// missing value means "keep the one you have".
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// When the access token expires, counting from `now`.
    ///
    /// A lifetime that cannot be represented as a timestamp is an error.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Duration::try_seconds(lifetime)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| {
                AppError::SpotifyRequest(format!("invalid expires_in: {}", lifetime))
            })
    }

    /// Credentials to persist for this response.
    pub fn into_update(self, now: DateTime<Utc>) -> Result<TokenUpdate, AppError> {
        Ok(TokenUpdate {
            expires_at: self.expires_at(now)?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        })
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token_rotated", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Spotify user profile. Unknown fields are kept so `/api/me` can pass the
/// profile through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Window Spotify computes top items over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

/// One page of `/me/top/tracks`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopTracksPage {
    #[serde(default)]
    pub items: Vec<SpotifyTrack>,
}

/// Track object as returned in top-track listings.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub album: SpotifyAlbum,
}

impl SpotifyTrack {
    /// Artist names joined with ", ".
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
}

/// `/audio-features` response; unknown IDs come back as `null` entries.
#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    #[serde(default)]
    audio_features: Option<Vec<Option<serde_json::Value>>>,
}

/// Outcome of an audio-feature lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureFetch {
    /// Feature records returned by Spotify (null entries already dropped).
    Available(Vec<serde_json::Value>),
    /// The endpoint errored; the reason is kept for diagnostics.
    Unavailable(String),
}
