// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle: acquisition, storage and expiry-based refresh.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::UserAccount;
use crate::services::spotify::{SpotifyClient, TokenResponse, UserProfile};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared refresh locks, keyed by `users.id`.
pub type RefreshLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

/// Hands out usable access tokens, refreshing them through Spotify when needed.
///
/// Refreshed credentials are written to storage before the new token is
/// returned. Refreshes for one account are serialized within this process;
/// across processes the last writer wins.
#[derive(Clone)]
pub struct TokenManager {
    client: SpotifyClient,
    db: SqliteDb,
    refresh_locks: RefreshLocks,
}

impl TokenManager {
    pub fn new(client: SpotifyClient, db: SqliteDb) -> Self {
        Self {
            client,
            db,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Complete the authorization-code flow and store the resulting account.
    pub async fn authorize(&self, code: &str) -> Result<UserAccount, AppError> {
        let now = Utc::now();
        let grant = self.client.exchange_code(code).await?;
        let profile = self.client.get_profile(&grant.access_token).await?;
        self.store_authorization(grant, &profile, now).await
    }

    /// Persist a code-exchange grant for `profile`, counting expiry from
    /// `issued_at`.
    pub async fn store_authorization(
        &self,
        grant: TokenResponse,
        profile: &UserProfile,
        issued_at: DateTime<Utc>,
    ) -> Result<UserAccount, AppError> {
        let user = self
            .db
            .upsert_authorized_user(
                &profile.id,
                profile.display_name.as_deref(),
                &grant.into_update(issued_at)?,
            )
            .await?;

        tracing::info!(spotify_user_id = %user.spotify_user_id, "Spotify account authorized");
        Ok(user)
    }

    /// Return an access token for `user` that is valid for at least the
    /// refresh margin, refreshing it first if necessary.
    pub async fn valid_access_token(&self, user: &UserAccount) -> Result<String, AppError> {
        if !user.needs_refresh(Utc::now()) {
            return Ok(user.access_token.clone());
        }
        self.refresh(user, None).await
    }

    /// Replace an access token Spotify has just rejected.
    ///
    /// No exchange happens if the stored token already differs from
    /// `rejected` and is still fresh (another request refreshed it).
    pub async fn refresh_after_rejection(
        &self,
        user: &UserAccount,
        rejected: &str,
    ) -> Result<String, AppError> {
        self.refresh(user, Some(rejected)).await
    }

    /// Run a Spotify call with a valid token; on a 401, refresh once and
    /// run it again.
    pub async fn with_token<T, F, Fut>(&self, user: &UserAccount, mut call: F) -> Result<T, AppError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let token = self.valid_access_token(user).await?;

        match call(token.clone()).await {
            Err(e) if e.is_spotify_unauthorized() => {
                tracing::info!(
                    spotify_user_id = %user.spotify_user_id,
                    "Access token rejected, refreshing"
                );
                let token = self.refresh_after_rejection(user, &token).await?;
                call(token).await
            }
            other => other,
        }
    }

    async fn refresh(&self, user: &UserAccount, rejected: Option<&str>) -> Result<String, AppError> {
        let lock = self
            .refresh_locks
            .entry(user.id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let current = self
            .db
            .get_user(&user.spotify_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user.spotify_user_id)))?;

        let superseded = rejected.map_or(true, |token| current.access_token != token);
        if superseded && !current.needs_refresh(Utc::now()) {
            return Ok(current.access_token);
        }

        tracing::info!(spotify_user_id = %current.spotify_user_id, "Refreshing access token");

        let now = Utc::now();
        let response = self.client.refresh_token(&current.refresh_token).await?;
        let update = response.into_update(now)?;
        self.db.update_tokens(current.id, &update).await?;

        tracing::info!(
            spotify_user_id = %current.spotify_user_id,
            expires_at = %update.expires_at,
            refresh_token_rotated = update.refresh_token.is_some(),
            "Access token refreshed"
        );
        Ok(update.access_token)
    }
}
