//! The boundary between the client and the digest backend.

use crate::core::{DigestSummary, FilterSettings, RepoKey, Repository, TransportFailure};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Defines the remote operations the store depends on.
/// This allows a fake implementation during tests, avoiding the need
/// to talk to a running backend.
#[async_trait]
pub trait SettingsTransport: Send + Sync {
    /// Fetches the stored settings. `Ok(None)` means the backend has no
    /// record for this repository yet.
    async fn fetch_settings(
        &self,
        key: &RepoKey,
    ) -> Result<Option<FilterSettings>, TransportFailure>;

    /// Replaces the stored settings and returns what the backend stored.
    async fn put_settings(
        &self,
        key: &RepoKey,
        settings: &FilterSettings,
    ) -> Result<FilterSettings, TransportFailure>;

    /// Submits a natural-language prompt to the AI file filter.
    async fn start_ai_filter(&self, key: &RepoKey, prompt: &str) -> Result<(), TransportFailure>;
}

/// Read-side operations on the repositories the backend has cloned.
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<Repository>, TransportFailure>;

    /// `Ok(None)` when the backend does not know the repository.
    async fn get_repository(&self, key: &RepoKey) -> Result<Option<Repository>, TransportFailure>;

    /// Asks the backend for the digest summary of a repository, optionally
    /// narrowed by an AI filter prompt.
    async fn fetch_summary(
        &self,
        key: &RepoKey,
        prompt: Option<&str>,
    ) -> Result<Option<DigestSummary>, TransportFailure>;

    /// Generates the digest text of a repository.
    async fn generate_digest(
        &self,
        key: &RepoKey,
        prompt: Option<&str>,
    ) -> Result<String, TransportFailure>;
}

/// The production implementation that talks JSON over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot be used as a base: {base_url}");
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, base_url })
    }

    /// Appends `segments` to the base URL, each one percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds `{base}/repositories/{author}/{name}/{endpoint}`.
    pub fn endpoint(&self, key: &RepoKey, endpoint: &str) -> Url {
        self.url(&["repositories", key.author.as_str(), key.name.as_str(), endpoint])
    }

    fn check_status(response: &reqwest::Response) -> Result<(), TransportFailure> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportFailure::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }

    /// Parses an optional JSON record; empty bodies and JSON `null` mean "no record".
    fn parse_optional<T: DeserializeOwned>(body: &str) -> Result<Option<T>, TransportFailure> {
        if body.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(body)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    fn parse_settings(body: &str) -> Result<Option<FilterSettings>, TransportFailure> {
        Ok(Self::parse_optional::<Value>(body)?.map(|value| FilterSettings::from_remote_value(&value)))
    }

    /// The digest endpoint answers with a JSON string; anything else is
    /// taken as the digest text itself.
    fn parse_digest(body: String) -> String {
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::String(text)) => text,
            _ => body,
        }
    }

    /// Sends `request` and returns the body, or `None` on 404.
    async fn send_optional(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<String>, TransportFailure> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status(&response)?;
        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl SettingsTransport for HttpTransport {
    async fn fetch_settings(
        &self,
        key: &RepoKey,
    ) -> Result<Option<FilterSettings>, TransportFailure> {
        let url = self.endpoint(key, "settings");
        tracing::debug!("GET {}", url);
        match self.send_optional(self.client.get(url)).await? {
            Some(body) => Self::parse_settings(&body),
            None => Ok(None),
        }
    }

    async fn put_settings(
        &self,
        key: &RepoKey,
        settings: &FilterSettings,
    ) -> Result<FilterSettings, TransportFailure> {
        let url = self.endpoint(key, "settings");
        tracing::debug!("PUT {}", url);
        let response = self.client.put(url).json(settings).send().await?;
        Self::check_status(&response)?;
        let body = response.text().await?;
        Ok(Self::parse_settings(&body)?.unwrap_or_else(|| settings.clone()))
    }

    async fn start_ai_filter(&self, key: &RepoKey, prompt: &str) -> Result<(), TransportFailure> {
        let url = self.endpoint(key, "filter");
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await?;
        Self::check_status(&response)
    }
}

#[async_trait]
impl RepositoryTransport for HttpTransport {
    async fn list_repositories(&self) -> Result<Vec<Repository>, TransportFailure> {
        let url = self.url(&["repositories"]);
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::check_status(&response)?;
        let body = response.text().await?;
        Ok(Self::parse_optional(&body)?.unwrap_or_default())
    }

    async fn get_repository(&self, key: &RepoKey) -> Result<Option<Repository>, TransportFailure> {
        let url = self.url(&["repositories", key.author.as_str(), key.name.as_str()]);
        tracing::debug!("GET {}", url);
        match self.send_optional(self.client.get(url)).await? {
            Some(body) => Self::parse_optional(&body),
            None => Ok(None),
        }
    }

    async fn fetch_summary(
        &self,
        key: &RepoKey,
        prompt: Option<&str>,
    ) -> Result<Option<DigestSummary>, TransportFailure> {
        let url = self.url(&["summary"]);
        tracing::debug!("POST {} for {}", url, key);
        let request = self
            .client
            .post(url)
            .json(&json!({ "url": key.to_string(), "prompt": prompt }));
        match self.send_optional(request).await? {
            Some(body) => Self::parse_optional(&body),
            None => Ok(None),
        }
    }

    async fn generate_digest(
        &self,
        key: &RepoKey,
        prompt: Option<&str>,
    ) -> Result<String, TransportFailure> {
        let url = self.url(&["digest"]);
        tracing::debug!("POST {} for {}", url, key);
        let response = self
            .client
            .post(url)
            .json(&json!({ "url": key.github_url(), "prompt": prompt }))
            .send()
            .await?;
        Self::check_status(&response)?;
        Ok(Self::parse_digest(response.text().await?))
    }
}
