//! Client for the relay's asset listing endpoint.
//!
//! `GET {base}/api/assets/{channel}` returns the images uploaded to a channel as
//! `[{"filename": ..., "content_type": ...}]`. Each entry resolves to a source
//! ref the writer can place with `add_asset`.

#[cfg(test)]
#[path = "catalog_test.rs"]
mod catalog_test;

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid asset base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("asset listing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("asset listing returned HTTP {0}")]
    Status(u16),
}

/// One uploaded file available on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub filename: String,
    pub content_type: String,
}

impl CatalogEntry {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Source ref for one uploaded file.
#[must_use]
pub fn source_ref(base_url: &str, channel: &str, filename: &str) -> String {
    format!("{}/{filename}", listing_url(base_url, channel))
}

fn listing_url(base_url: &str, channel: &str) -> String {
    format!("{}/api/assets/{channel}", base_url.trim_end_matches('/'))
}

/// List a channel's uploaded images, sorted by filename.
///
/// Non-image entries are skipped.
///
/// # Errors
///
/// Returns [`CatalogError::InvalidBaseUrl`] for a non-HTTP base URL,
/// [`CatalogError::Status`] for a non-success response, and
/// [`CatalogError::Http`] for transport or body decoding failures.
pub async fn list_assets(http: &reqwest::Client, base_url: &str, channel: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(CatalogError::InvalidBaseUrl(base_url.to_owned()));
    }
    let url = listing_url(base_url, channel);
    let response = http.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::Status(status.as_u16()));
    }
    let entries: Vec<CatalogEntry> = response.json().await?;
    let listed = entries.len();
    let images = sorted_images(entries);
    debug!(%url, listed, images = images.len(), "catalog: listed assets");
    Ok(images)
}

fn sorted_images(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut images: Vec<CatalogEntry> = entries.into_iter().filter(CatalogEntry::is_image).collect();
    images.sort_by(|a, b| a.filename.cmp(&b.filename));
    images
}
