//! Master playlist inspection
//!
//! The streaming backend does its own manifest handling; this module only
//! reads the quality ladder out of a master playlist so it can be shown
//! before (or without) a backend.

#[cfg(feature = "hls")]
mod hls;

#[cfg(feature = "hls")]
pub use hls::{is_master_playlist, parse_quality_levels};

use crate::error::{Error, Result};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// Download a manifest as text
#[instrument(skip(client))]
pub async fn fetch_manifest(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching manifest: {}", url);

    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::ManifestParse(format!("{} returned {}", url, status)));
    }
    Ok(response.text().await?)
}

/// Download a master playlist and read its quality levels
#[cfg(feature = "hls")]
pub async fn load_quality_levels(client: &Client, url: &Url) -> Result<Vec<crate::types::QualityLevel>> {
    let content = fetch_manifest(client, url).await?;
    parse_quality_levels(&content)
}
