use std::{fmt, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Independently fetched upstream resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The entity roster.
    Entities,
    /// Upgrade quest progress.
    Quests,
    /// Current and upcoming blessings.
    Blessings,
}

impl DataSource {
    /// Every source, in fetch order.
    pub const ALL: [DataSource; 3] = [Self::Entities, Self::Quests, Self::Blessings];

    /// Path segment and log name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entities => "entities",
            Self::Quests => "quests",
            Self::Blessings => "blessings",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-changing request against the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action name, e.g. `collect_salary`.
    pub name: String,
    /// Target entity, when the action has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Action specific arguments.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Action {
    /// Action without target or arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_id: None,
            params: Value::Null,
        }
    }

    /// Target an entity.
    pub fn for_entity(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Attach arguments.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Failures the upstream reports in its own terms.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Too many requests; the call may be retried later.
    #[error("upstream rate limit hit")]
    RateLimited,
    /// Any other non-success status.
    #[error("upstream answered {0}")]
    Status(u16),
}

/// The remote game API.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Raw JSON for one data source.
    async fn fetch(&self, source: DataSource) -> Result<Value>;

    /// Perform an action and return the raw result.
    async fn mutate(&self, action: &Action) -> Result<Value>;
}

/// [`Upstream`] over a JSON HTTP API.
///
/// Sources are read with `GET {base}/{source}` and actions posted to
/// `POST {base}/actions`.
pub struct HttpUpstream {
    client: Client,
    base_url: String,
}

impl HttpUpstream {
    /// Client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().gzip(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// API root without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read(response: reqwest::Response) -> Result<Value> {
        if let Some(err) = status_error(response.status()) {
            return Err(err.into());
        }
        response
            .json::<Value>()
            .await
            .context("failed to decode upstream response")
    }
}

/// Error for a non-success status. A 429 is a rate limit.
fn status_error(status: StatusCode) -> Option<UpstreamError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(UpstreamError::RateLimited),
        status if !status.is_success() => Some(UpstreamError::Status(status.as_u16())),
        _ => None,
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, source: DataSource) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, source);
        debug!(%url, "fetching");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {source}"))?;
        Self::read(response).await
    }

    async fn mutate(&self, action: &Action) -> Result<Value> {
        let url = format!("{}/actions", self.base_url);
        debug!(%url, action = %action.name, "posting action");
        let response = self
            .client
            .post(&url)
            .json(action)
            .send()
            .await
            .with_context(|| format!("failed to send action {}", action.name))?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_wire_shape() -> Result<()> {
        let bare = serde_json::to_value(Action::new("collect_all"))?;
        assert_eq!(bare, serde_json::json!({"name": "collect_all"}));

        let pose = Action::new("change_pose")
            .for_entity("42")
            .with_params(serde_json::json!({"pose": 3}));
        let value = serde_json::to_value(&pose)?;
        assert_eq!(value["entity_id"], "42");
        assert_eq!(serde_json::from_value::<Action>(value)?, pose);
        Ok(())
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            Some(UpstreamError::RateLimited)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR),
            Some(UpstreamError::Status(500))
        ));
        assert!(status_error(StatusCode::OK).is_none());
    }

    #[test]
    fn base_url_drops_trailing_slash() -> Result<()> {
        let upstream = HttpUpstream::new("http://localhost:9000/api/", None)?;
        assert_eq!(upstream.base_url(), "http://localhost:9000/api");
        Ok(())
    }
}
