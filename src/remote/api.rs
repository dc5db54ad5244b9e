//! Session-metadata API client.
//!
//! `GET <url>` returns `{path, id}` — where the next take should be
//! delivered. `POST <url>` with `{id}` reports a completed session. Both
//! carry `Authorization: Token …` and both are skipped when no token is
//! configured.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::session::SessionContext;

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the session-metadata API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("session API returned status {0}")]
    Status(u16),

    /// The response body could not be parsed as expected JSON.
    #[error("failed to parse session response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// SessionApi trait
// ---------------------------------------------------------------------------

/// Async seam for the remote session source.
///
/// `fetch_session` returns `Ok(None)` when no credential is configured —
/// the caller then falls back to the local default context.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn fetch_session(&self) -> Result<Option<SessionContext>, ApiError>;
    async fn notify_complete(&self, id: i64) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// HttpSessionApi
// ---------------------------------------------------------------------------

/// Wire format of the GET response.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    path: String,
    id: i64,
}

/// reqwest-backed [`SessionApi`] implementation.
pub struct HttpSessionApi {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpSessionApi {
    /// Build the client from application config.
    ///
    /// A default (no-timeout) client is the last-resort fallback if the
    /// builder fails (should never happen in practice).
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
        }
    }

    fn auth_header(&self, token: &str) -> String {
        format!("Token {token}")
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_session(&self) -> Result<Option<SessionContext>, ApiError> {
        let Some(token) = &self.token else {
            return Ok(None);
        };

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header(token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(Some(SessionContext {
            upload_path: body.path,
            title: None,
            id: Some(body.id),
        }))
    }

    async fn notify_complete(&self, id: i64) -> Result<(), ApiError> {
        let Some(token) = &self.token else {
            log::debug!("no API token configured - skipping completion notify");
            return Ok(());
        };

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header(token))
            .form(&[("id", id.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
