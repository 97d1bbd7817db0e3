// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Top-track ingestion: fetch a user's ranking from Spotify, record it, then
//! enrich the catalog with audio features.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{NewCatalogItem, UserAccount};
use crate::services::spotify::{FeatureFetch, SpotifyClient, TimeRange};
use chrono::Utc;

/// Number of top tracks requested when the caller does not say.
pub const DEFAULT_TOP_TRACKS_LIMIT: u32 = 50;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Tracks fetched and recorded in the ranking log
    pub fetched: usize,
    pub features: FeatureOutcome,
}

/// What happened during audio-feature enrichment.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome {
    /// Number of tracks whose feature blob was written
    Stored(usize),
    /// Feature endpoint failed; metadata and rankings are still stored
    Unavailable(String),
}

/// Stores a user's top tracks and their audio features.
#[derive(Clone)]
pub struct TopTracksIngestor {
    client: SpotifyClient,
    db: SqliteDb,
}

impl TopTracksIngestor {
    pub fn new(client: SpotifyClient, db: SqliteDb) -> Self {
        Self { client, db }
    }

    /// Fetch and store `user`'s top tracks using an already-valid token.
    ///
    /// Catalog rows are created on first sighting only; a ranking row is
    /// appended for every track on every run. Audio-feature failures do not
    /// fail the run. There is no rollback: a run that stops part way keeps
    /// whatever it already wrote.
    pub async fn ingest(
        &self,
        access_token: &str,
        user: &UserAccount,
        limit: u32,
        time_range: TimeRange,
    ) -> Result<IngestReport, AppError> {
        let page = self
            .client
            .top_tracks(access_token, limit, time_range)
            .await?;

        let retrieved_at = Utc::now();
        let mut track_ids = Vec::with_capacity(page.items.len());

        for (index, track) in page.items.iter().enumerate() {
            let item = NewCatalogItem {
                spotify_track_id: track.id.clone(),
                name: track.name.clone(),
                artist: track.artist_names(),
                album: track.album.name.clone(),
            };
            let track_row_id = self.db.upsert_catalog_item(&item).await?;

            let rank = index as i64 + 1;
            self.db
                .append_ranking(user.id, track_row_id, rank, retrieved_at)
                .await?;

            track_ids.push(track.id.clone());
        }

        let features = self.store_features(access_token, &track_ids).await?;

        tracing::info!(
            spotify_user_id = %user.spotify_user_id,
            fetched = track_ids.len(),
            features = ?features,
            "Top tracks ingested"
        );

        Ok(IngestReport {
            fetched: track_ids.len(),
            features,
        })
    }

    async fn store_features(
        &self,
        access_token: &str,
        track_ids: &[String],
    ) -> Result<FeatureOutcome, AppError> {
        if track_ids.is_empty() {
            return Ok(FeatureOutcome::Stored(0));
        }

        let records = match self.client.audio_features(access_token, track_ids).await {
            FeatureFetch::Available(records) => records,
            FeatureFetch::Unavailable(reason) => return Ok(FeatureOutcome::Unavailable(reason)),
        };

        let mut stored = 0;
        for record in &records {
            let Some(id) = record.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            if self.db.set_audio_features(id, record).await? {
                stored += 1;
            }
        }
        Ok(FeatureOutcome::Stored(stored))
    }
}
