// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mood Companion API Server
//!
//! Connects Spotify accounts over OAuth and stores each user's top tracks
//! with their audio features.

use mood_companion::{config::Config, db::SqliteDb, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment; missing client credentials are fatal
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Mood Companion API");

    let db = SqliteDb::connect(&config.database_url).await?;

    let state = Arc::new(AppState::new(config.clone(), db));
    let app = mood_companion::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,mood_companion=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
