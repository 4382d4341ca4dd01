//! Publishing verified exports
//!
//! A [`Publisher`] only accepts a [`VerifiedExport`], which exists only after
//! the PII check passed. The gist publisher creates a new public gist, or
//! updates the configured one in place.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_sanitizer::VerifiedExport;

/// Name of the file inside the gist
pub const GIST_FILE_NAME: &str = "vibe-clock-data.json";

const GITHUB_API: &str = "https://api.github.com";
const GIST_DESCRIPTION: &str = "vibe-clock stats - AI coding agent usage";
const USER_AGENT: &str = concat!("vibeclock/", env!("CARGO_PKG_VERSION"));

/// Where a publish ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub gist_id: String,
    pub html_url: Option<String>,
    /// True when a new gist was created rather than updated
    pub created: bool,
}

/// Destination for verified exports
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, export: &VerifiedExport) -> Result<PublishReceipt>;
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    html_url: Option<String>,
}

/// Publishes to a GitHub gist
pub struct GistPublisher {
    client: reqwest::Client,
    token: String,
    gist_id: Option<String>,
    api_base: String,
}

impl GistPublisher {
    pub fn new(token: impl Into<String>, gist_id: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            token: token.into(),
            gist_id: gist_id.filter(|id| !id.trim().is_empty()),
            api_base: GITHUB_API.to_string(),
        }
    }

    /// Point at a different API host, e.g. GitHub Enterprise
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// HTTP method and URL for the next publish
    fn target(&self) -> (reqwest::Method, String) {
        match &self.gist_id {
            Some(id) => (
                reqwest::Method::PATCH,
                format!("{}/gists/{}", self.api_base, id),
            ),
            None => (reqwest::Method::POST, format!("{}/gists", self.api_base)),
        }
    }
}

/// Request body carrying the export as the gist's only file
pub fn gist_payload(export: &VerifiedExport) -> Result<Value> {
    let content = export.to_json_pretty()?;
    Ok(json!({
        "description": GIST_DESCRIPTION,
        "public": true,
        "files": {
            GIST_FILE_NAME: { "content": content },
        },
    }))
}

#[async_trait]
impl Publisher for GistPublisher {
    async fn publish(&self, export: &VerifiedExport) -> Result<PublishReceipt> {
        let payload = gist_payload(export)?;
        let (method, url) = self.target();
        debug!("{} {}", method, url);

        let response = self
            .client
            .request(method, &url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VibeclockError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let gist: GistResponse = response.json().await?;
        let created = self.gist_id.is_none();
        info!(
            "{} gist {}",
            if created { "Created" } else { "Updated" },
            gist.id
        );
        Ok(PublishReceipt {
            gist_id: gist.id,
            html_url: gist.html_url,
            created,
        })
    }
}
