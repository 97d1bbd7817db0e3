// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Track catalog and per-user ranking models.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stored catalog record, one per Spotify track ID.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CatalogItem {
    /// Local row ID
    pub id: i64,
    /// Spotify track ID (unique)
    pub spotify_track_id: String,
    /// Track title
    pub name: String,
    /// Artist names joined with ", "
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
    /// Audio features as returned by Spotify (raw JSON text)
    pub audio_features: Option<String>,
}

impl CatalogItem {
    /// Parsed audio-feature blob, if one has been stored.
    pub fn features(&self) -> Option<serde_json::Value> {
        self.audio_features
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Metadata for a first sighting of a track.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub spotify_track_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
}

/// One row of the append-only top-tracks log.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RankingEntry {
    pub id: i64,
    /// `users.id`
    pub user_id: i64,
    /// `tracks.id`
    pub track_id: i64,
    /// 1-based position in the user's top list
    pub rank: i64,
    pub retrieved_at: DateTime<Utc>,
}
