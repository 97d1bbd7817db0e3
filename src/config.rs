// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Missing Spotify client credentials
//! are fatal so the server never starts half-configured.

use std::env;

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/auth/callback";
const DEFAULT_DATABASE_URL: &str = "sqlite://dev.db";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_PORT: u16 = 8000;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Spotify client settings handed to `SpotifyClient::new`
    pub spotify: SpotifyConfig,
    /// Storage connection string (sqlx SQLite URL)
    pub database_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

/// Credentials and endpoints for the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    /// OAuth client ID (public)
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with Spotify
    pub redirect_uri: String,
    /// Accounts service base, hosts `/authorize` and `/api/token`
    pub accounts_url: String,
    /// Web API base, e.g. `https://api.spotify.com/v1`
    pub api_url: String,
}

impl SpotifyConfig {
    /// Config pointing both Spotify hosts at a single base URL (mock servers).
    pub fn for_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            accounts_url: base.to_string(),
            api_url: format!("{}/v1", base),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let client_id = required("SPOTIFY_CLIENT_ID")?;
        let client_secret = required("SPOTIFY_CLIENT_SECRET")?;

        Ok(Self {
            spotify: SpotifyConfig {
                client_id,
                client_secret,
                redirect_uri: optional("SPOTIFY_REDIRECT_URI", DEFAULT_REDIRECT_URI),
                accounts_url: optional("SPOTIFY_ACCOUNTS_URL", DEFAULT_ACCOUNTS_URL)
                    .trim_end_matches('/')
                    .to_string(),
                api_url: optional("SPOTIFY_API_URL", DEFAULT_API_URL)
                    .trim_end_matches('/')
                    .to_string(),
            },
            database_url: optional("DATABASE_URL", DEFAULT_DATABASE_URL),
            frontend_url: optional("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            spotify: SpotifyConfig::for_base_url("http://127.0.0.1:9"),
            database_url: "sqlite::memory:".to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Read a required variable; blank values count as missing.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
