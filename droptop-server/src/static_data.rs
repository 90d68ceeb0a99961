//! Static catalog documents fetched from the GlobalData repository
//!
//! The changelog and announcements are not stored in the database; they are
//! published as JSON files and proxied on request.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::StaticDataConfig;

#[derive(Debug, thiserror::Error)]
pub enum StaticDataError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected document shape from {url}: {reason}")]
    Shape { url: String, reason: &'static str },
}

/// Source of the changelog and announcements documents
#[async_trait]
pub trait StaticData: Send + Sync {
    /// Changelog entries, newest first as published
    async fn changelog(&self) -> Result<Vec<Value>, StaticDataError>;

    async fn announcements(&self) -> Result<Value, StaticDataError>;
}

/// Fetches documents over HTTP on every call
pub struct HttpStaticData {
    client: reqwest::Client,
    changelog_url: String,
    announcements_url: String,
}

impl HttpStaticData {
    pub fn new(config: &StaticDataConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("droptop-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            changelog_url: config.changelog_url.clone(),
            announcements_url: config.announcements_url.clone(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Value, StaticDataError> {
        let fetch_err = |source| StaticDataError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(fetch_err)?;
        if !response.status().is_success() {
            return Err(StaticDataError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(fetch_err)
    }
}

#[async_trait]
impl StaticData for HttpStaticData {
    async fn changelog(&self) -> Result<Vec<Value>, StaticDataError> {
        let document = self.fetch(&self.changelog_url).await?;
        changelog_entries(document).map_err(|reason| StaticDataError::Shape {
            url: self.changelog_url.clone(),
            reason,
        })
    }

    async fn announcements(&self) -> Result<Value, StaticDataError> {
        self.fetch(&self.announcements_url).await
    }
}

/// Accepts both `{"changelog": [...]}` and a bare array.
fn changelog_entries(document: Value) -> Result<Vec<Value>, &'static str> {
    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove("changelog") {
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => Err("`changelog` is not an array"),
            None => Err("missing `changelog` key"),
        },
        _ => Err("expected an object or array"),
    }
}

/// Entry of `entries` whose `version` equals `version`.
pub fn find_changenote<'a>(entries: &'a [Value], version: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|entry| entry.get("version").and_then(Value::as_str) == Some(version))
}

/// Fixed documents, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct FixedStaticData {
    pub changelog: Vec<Value>,
    pub announcements: Value,
}

#[async_trait]
impl StaticData for FixedStaticData {
    async fn changelog(&self) -> Result<Vec<Value>, StaticDataError> {
        Ok(self.changelog.clone())
    }

    async fn announcements(&self) -> Result<Value, StaticDataError> {
        Ok(self.announcements.clone())
    }
}
