// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ingest;
pub mod spotify;
pub mod tokens;

pub use ingest::{FeatureOutcome, IngestReport, TopTracksIngestor};
pub use spotify::{FeatureFetch, SpotifyClient};
pub use tokens::TokenManager;
