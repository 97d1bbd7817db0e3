//! User account model: Spotify identity plus stored OAuth credentials.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Tokens expiring within this many seconds are treated as already expired.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Row in the `users` table.
#[derive(Clone, sqlx::FromRow)]
pub struct UserAccount {
    /// Local row ID
    pub id: i64,
    /// Spotify user ID (unique)
    pub spotify_user_id: String,
    /// Display name from the Spotify profile, if shared
    pub display_name: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires; `None` forces a refresh
    pub token_expires: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Whether the stored access token must be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.token_expires {
            None => true,
            Some(expires) => expires <= now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAccount")
            .field("id", &self.id)
            .field("spotify_user_id", &self.spotify_user_id)
            .field("display_name", &self.display_name)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_expires", &self.token_expires)
            .finish()
    }
}

/// Credentials to persist after an authorization-code or refresh exchange.
#[derive(Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    /// `None` keeps the refresh token already on file
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenUpdate")
            .field("refresh_token_rotated", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
