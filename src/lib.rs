// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Mood Companion: Spotify top-track collector
//!
//! This crate provides the backend API that connects a user's Spotify
//! account, keeps their OAuth tokens fresh, and records their top tracks
//! together with audio-feature metadata.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::SqliteDb;
use services::{SpotifyClient, TokenManager, TopTracksIngestor};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SqliteDb,
    pub spotify: SpotifyClient,
    pub tokens: TokenManager,
    pub ingestor: TopTracksIngestor,
}

impl AppState {
    /// Wire the services together around one database handle.
    pub fn new(config: Config, db: SqliteDb) -> Self {
        let spotify = SpotifyClient::new(config.spotify.clone());
        let tokens = TokenManager::new(spotify.clone(), db.clone());
        let ingestor = TopTracksIngestor::new(spotify.clone(), db.clone());

        Self {
            config,
            db,
            spotify,
            tokens,
            ingestor,
        }
    }
}
