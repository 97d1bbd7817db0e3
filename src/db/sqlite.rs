// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite storage with typed operations.
//!
//! Provides high-level operations for:
//! - Users (Spotify identity and OAuth tokens)
//! - Tracks (catalog, one row per Spotify track)
//! - User top tracks (append-only ranking log)
//!
//! Every call borrows a connection from the pool for the duration of the
//! query; the connection goes back to the pool when the call returns,
//! successfully or not.

use crate::db::tables;
use crate::error::AppError;
use crate::models::{CatalogItem, NewCatalogItem, RankingEntry, TokenUpdate, UserAccount};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

const USER_COLUMNS: &str =
    "id, spotify_user_id, display_name, access_token, refresh_token, token_expires";

/// SQLite database handle.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    ///
    /// `sqlite::memory:` URLs get a single long-lived connection so every
    /// query sees the same in-memory database.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.create_schema().await?;

        tracing::info!(url = %redact_url(url), "Connected to SQLite");
        Ok(db)
    }

    /// Fresh, empty in-memory database (tests and local experiments).
    pub async fn in_memory() -> Result<Self, AppError> {
        Self::connect("sqlite::memory:").await
    }

    async fn create_schema(&self) -> Result<(), AppError> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    spotify_user_id TEXT NOT NULL UNIQUE,
                    display_name TEXT,
                    access_token TEXT NOT NULL,
                    refresh_token TEXT NOT NULL,
                    token_expires TEXT
                )",
                tables::USERS
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    spotify_track_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    artist TEXT,
                    album TEXT,
                    audio_features TEXT
                )",
                tables::TRACKS
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES {}(id),
                    track_id INTEGER NOT NULL REFERENCES {}(id),
                    rank INTEGER NOT NULL,
                    retrieved_at TEXT NOT NULL
                )",
                tables::USER_TOP_TRACKS,
                tables::USERS,
                tables::TRACKS
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_user_top_tracks_user_id ON {}(user_id)",
                tables::USER_TOP_TRACKS
            ),
        ];

        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by Spotify user ID.
    pub async fn get_user(&self, spotify_user_id: &str) -> Result<Option<UserAccount>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE spotify_user_id = ?",
            USER_COLUMNS,
            tables::USERS
        );
        let user = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(spotify_user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Number of connected users.
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM {}", tables::USERS);
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Create or update a user after a successful authorization-code exchange.
    ///
    /// An existing user keeps the stored refresh token and display name when
    /// the new values are absent. A new user requires a refresh token.
    pub async fn upsert_authorized_user(
        &self,
        spotify_user_id: &str,
        display_name: Option<&str>,
        tokens: &TokenUpdate,
    ) -> Result<UserAccount, AppError> {
        let user = match tokens.refresh_token.as_deref() {
            Some(refresh_token) => {
                let sql = format!(
                    "INSERT INTO {table} (spotify_user_id, display_name, access_token, refresh_token, token_expires)
                     VALUES (?, ?, ?, ?, ?)
                     ON CONFLICT(spotify_user_id) DO UPDATE SET
                         display_name = COALESCE(excluded.display_name, {table}.display_name),
                         access_token = excluded.access_token,
                         refresh_token = excluded.refresh_token,
                         token_expires = excluded.token_expires
                     RETURNING {cols}",
                    table = tables::USERS,
                    cols = USER_COLUMNS
                );
                sqlx::query_as::<_, UserAccount>(&sql)
                    .bind(spotify_user_id)
                    .bind(display_name)
                    .bind(&tokens.access_token)
                    .bind(refresh_token)
                    .bind(tokens.expires_at)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "UPDATE {} SET
                         display_name = COALESCE(?, display_name),
                         access_token = ?,
                         token_expires = ?
                     WHERE spotify_user_id = ?
                     RETURNING {}",
                    tables::USERS,
                    USER_COLUMNS
                );
                sqlx::query_as::<_, UserAccount>(&sql)
                    .bind(display_name)
                    .bind(&tokens.access_token)
                    .bind(tokens.expires_at)
                    .bind(spotify_user_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| {
                        AppError::SpotifyRequest(
                            "Token response for a new user is missing refresh_token".to_string(),
                        )
                    })?
            }
        };
        Ok(user)
    }

    /// Store refreshed credentials for a user.
    ///
    /// Access token, expiry and (optionally) refresh token are written by a
    /// single statement, so readers never see a token paired with the wrong
    /// expiry.
    pub async fn update_tokens(&self, user_id: i64, tokens: &TokenUpdate) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET
                 access_token = ?,
                 token_expires = ?,
                 refresh_token = COALESCE(?, refresh_token)
             WHERE id = ?",
            tables::USERS
        );
        let result = sqlx::query(&sql)
            .bind(&tokens.access_token)
            .bind(tokens.expires_at)
            .bind(tokens.refresh_token.as_deref())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User row {}", user_id)));
        }
        Ok(())
    }

    // ─── Track Operations ────────────────────────────────────────

    /// Insert a track if it is new and return its row ID.
    ///
    /// Metadata of an already-known track is left untouched.
    pub async fn upsert_catalog_item(&self, item: &NewCatalogItem) -> Result<i64, AppError> {
        let insert = format!(
            "INSERT INTO {} (spotify_track_id, name, artist, album) VALUES (?, ?, ?, ?)
             ON CONFLICT(spotify_track_id) DO NOTHING",
            tables::TRACKS
        );
        sqlx::query(&insert)
            .bind(&item.spotify_track_id)
            .bind(&item.name)
            .bind(&item.artist)
            .bind(&item.album)
            .execute(&self.pool)
            .await?;

        let select = format!("SELECT id FROM {} WHERE spotify_track_id = ?", tables::TRACKS);
        let id = sqlx::query_scalar::<_, i64>(&select)
            .bind(&item.spotify_track_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Overwrite a track's audio-feature blob. Returns false if the track is unknown.
    pub async fn set_audio_features(
        &self,
        spotify_track_id: &str,
        features: &serde_json::Value,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET audio_features = ? WHERE spotify_track_id = ?",
            tables::TRACKS
        );
        let result = sqlx::query(&sql)
            .bind(features.to_string())
            .bind(spotify_track_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a track by Spotify track ID.
    pub async fn get_catalog_item(
        &self,
        spotify_track_id: &str,
    ) -> Result<Option<CatalogItem>, AppError> {
        let sql = format!(
            "SELECT id, spotify_track_id, name, artist, album, audio_features
             FROM {} WHERE spotify_track_id = ?",
            tables::TRACKS
        );
        let item = sqlx::query_as::<_, CatalogItem>(&sql)
            .bind(spotify_track_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Number of distinct tracks in the catalog.
    pub async fn count_catalog_items(&self) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM {}", tables::TRACKS);
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ─── Ranking Operations ──────────────────────────────────────

    /// Append one ranking row for a user.
    pub async fn append_ranking(
        &self,
        user_id: i64,
        track_id: i64,
        rank: i64,
        retrieved_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} (user_id, track_id, rank, retrieved_at) VALUES (?, ?, ?, ?)",
            tables::USER_TOP_TRACKS
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(track_id)
            .bind(rank)
            .bind(retrieved_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All ranking rows for a user, oldest first.
    pub async fn ranking_entries(&self, user_id: i64) -> Result<Vec<RankingEntry>, AppError> {
        let sql = format!(
            "SELECT id, user_id, track_id, rank, retrieved_at FROM {}
             WHERE user_id = ? ORDER BY id",
            tables::USER_TOP_TRACKS
        );
        let entries = sqlx::query_as::<_, RankingEntry>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
