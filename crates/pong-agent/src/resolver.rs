//! Session creation over the game service's HTTP API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::errors::ResolveError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a successful `POST /session/create`.
#[derive(Clone, Debug, Deserialize)]
pub struct CreatedSession {
    /// Id the server registered.
    pub session_id: String,
    /// WebSocket path of the session.
    #[serde(default)]
    pub ws_url: String,
    /// Game state right after creation.
    #[serde(default)]
    pub initial_state: Value,
}

/// HTTP client for the session endpoints.
#[derive(Clone, Debug)]
pub struct SessionResolver {
    client: reqwest::Client,
    http_base: String,
}

impl SessionResolver {
    /// Resolver for the service at `base_url` (`ws`, `wss`, `http` or `https`).
    pub fn new(base_url: &str) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            http_base: http_base(base_url),
        })
    }

    /// HTTP origin requests go to.
    pub fn http_base(&self) -> &str {
        &self.http_base
    }

    /// Create (or look up) a session. The server picks the id when `None`.
    pub async fn create(&self, session_id: Option<&str>) -> Result<CreatedSession, ResolveError> {
        let url = format!("{}/session/create", self.http_base);
        let mut request = self.client.post(&url);
        if let Some(id) = session_id {
            request = request.query(&[("session_id", id)]);
        }

        let body: Value = request.send().await?.error_for_status()?.json().await?;
        if body.get("status").and_then(Value::as_str) != Some("success") {
            return Err(ResolveError::InvalidResponse(body.to_string()));
        }
        let created: CreatedSession = serde_json::from_value(body)
            .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;

        info!(session_id = %created.session_id, ws_url = %created.ws_url, "session created");
        Ok(created)
    }
}

/// Map a WebSocket base URL onto the HTTP origin of the same service.
fn http_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        trimmed.to_owned()
    }
}
