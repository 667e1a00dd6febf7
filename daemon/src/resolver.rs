/// Game id lookup against the configured HTTP endpoint.
///
/// The endpoint is expected to answer a plain GET with a JSON object carrying
/// a `current_game_id` field. A `null` field means the endpoint knows of no
/// current game. Lookups are best effort: callers log the error and carry on
/// with whatever id they already had.
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// JSON field holding the game id.
pub const CURRENT_GAME_FIELD: &str = "current_game_id";
/// Upper bound on a single lookup so a hung endpoint cannot hold back the log write.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("endpoint returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("response body is not valid JSON: {0}")]
    Body(#[from] serde_json::Error),
    #[error("response has no usable `current_game_id` field")]
    MissingField,
}

/// Source of the current game id.
#[async_trait]
pub trait GameIdResolver: Send + Sync {
    /// `Ok(None)` when the endpoint reports no current game.
    async fn resolve(&self, endpoint: &str) -> Result<Option<String>, ResolveError>;
}

/// Resolver backed by a shared `reqwest` client.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Builds a resolver whose lookups give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scenetag/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GameIdResolver for HttpResolver {
    async fn resolve(&self, endpoint: &str) -> Result<Option<String>, ResolveError> {
        let response = self.client.get(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status));
        }
        let body = response.text().await?;
        parse_game_id(&body)
    }
}

/// Extracts the game id from a response body.
///
/// Numeric ids are accepted and rendered in their decimal form. An explicit
/// `null` yields `Ok(None)`; an absent field is an error.
pub fn parse_game_id(body: &str) -> Result<Option<String>, ResolveError> {
    let value: Value = serde_json::from_str(body)?;
    match value.get(CURRENT_GAME_FIELD) {
        Some(Value::String(id)) => Ok(Some(id.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Null) => Ok(None),
        _ => Err(ResolveError::MissingField),
    }
}
