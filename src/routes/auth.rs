// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a login `state` stays acceptable at the callback.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(auth_login))
        .route("/auth/callback", get(auth_callback))
}

/// Start OAuth flow - redirect to Spotify authorization.
async fn auth_login(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let oauth_state = create_state(
        state.config.spotify.client_secret.as_bytes(),
        now_millis()?,
    )?;
    let auth_url = state.spotify.authorize_url(&oauth_state);

    tracing::info!(
        client_id = %state.config.spotify.client_id,
        "Starting OAuth flow, redirecting to Spotify"
    );

    Ok((StatusCode::FOUND, [(header::LOCATION, auth_url)]))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub msg: String,
    pub external_user_id: String,
}

/// OAuth callback - exchange code for tokens and store the account.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>> {
    // Check for OAuth errors (e.g. the user denied access)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Spotify");
        return Err(AppError::BadRequest(format!("Authorization failed: {}", error)));
    }

    let code = params.code.ok_or(AppError::MissingParameter("code"))?;

    match params.state.as_deref() {
        Some(oauth_state) => {
            let secret = state.config.spotify.client_secret.as_bytes();
            if !verify_state(oauth_state, secret, now_millis()?) {
                tracing::warn!("Invalid or expired OAuth state parameter");
                return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
            }
        }
        None => tracing::warn!("OAuth callback without state parameter"),
    }

    tracing::info!("Exchanging authorization code for tokens");
    let user = state.tokens.authorize(&code).await?;

    Ok(Json(CallbackResponse {
        msg: "auth success".to_string(),
        external_user_id: user.spotify_user_id,
    }))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Build a signed `state` value: "nonce_hex|timestamp_hex|signature_hex",
/// URL-safe base64 encoded.
fn create_state(secret: &[u8], now_ms: u128) -> Result<String> {
    let mut nonce = [0u8; 16];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Nonce generation failed: {}", e)))?;

    let payload = format!("{}|{:x}", hex::encode(nonce), now_ms);
    let signature = sign(&payload, secret)?;

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

fn sign(payload: &str, secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check the signature and age of a `state` produced by [`create_state`].
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> bool {
    let Some(state_str) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };

    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    let [nonce_hex, timestamp_hex, signature_hex] = parts.as_slice() else {
        return false;
    };

    let payload = format!("{}|{}", nonce_hex, timestamp_hex);
    let Ok(expected) = sign(&payload, secret) else {
        return false;
    };
    if !bool::from(signature_hex.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    match u128::from_str_radix(timestamp_hex, 16) {
        Ok(issued_ms) => issued_ms <= now_ms && now_ms - issued_ms <= STATE_MAX_AGE_MS,
        Err(_) => false,
    }
}
