//! Subtitle fetch collaborator
//!
//! The resolver only depends on [`SubtitleFetcher`]; [`HttpSubtitleFetcher`]
//! implements it against the media server's REST API:
//! - `GET {server}/api/media/{media_id}/subtitles/{track_index}`
//! - `GET {server}/api/subtitles/{id}`

use crate::error::{Error, Result};
use crate::types::{EngineConfig, MediaId};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Source of raw subtitle payloads
#[async_trait]
pub trait SubtitleFetcher: Send + Sync {
    /// Fetch a subtitle stream extracted from the media container
    async fn fetch_container_subtitle(&self, media_id: &MediaId, track_index: usize)
        -> Result<String>;

    /// Fetch a subtitle file by its external id
    async fn fetch_external_subtitle(&self, id: &str) -> Result<String>;
}

/// Fetcher backed by the media server's HTTP API
pub struct HttpSubtitleFetcher {
    client: Client,
    base_url: Url,
}

impl HttpSubtitleFetcher {
    /// Build a fetcher from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Self::with_client(client, config.server_url.clone())
    }

    /// Use an existing client
    pub fn with_client(client: Client, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "server URL cannot be a base: {}",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the server URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("server URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        debug!(url = %url, "Fetching subtitle payload");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!("{} returned {}", url, status)));
        }

        let body = response.bytes().await?;
        debug!(url = %url, bytes = body.len(), "Subtitle payload received");
        Ok(decode_payload(body))
    }
}

#[async_trait]
impl SubtitleFetcher for HttpSubtitleFetcher {
    #[instrument(skip(self))]
    async fn fetch_container_subtitle(
        &self,
        media_id: &MediaId,
        track_index: usize,
    ) -> Result<String> {
        let index = track_index.to_string();
        let url = self.endpoint(&["api", "media", media_id.as_str(), "subtitles", &index])?;
        self.get_text(url).await
    }

    #[instrument(skip(self))]
    async fn fetch_external_subtitle(&self, id: &str) -> Result<String> {
        let url = self.endpoint(&["api", "subtitles", id])?;
        self.get_text(url).await
    }
}

/// Decode a payload as UTF-8, dropping a byte order mark and replacing
/// invalid sequences
pub fn decode_payload(body: Bytes) -> String {
    let bytes = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&body[..]);
    String::from_utf8_lossy(bytes).into_owned()
}
