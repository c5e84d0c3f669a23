//! HTTP image loader for the reader.
//!
//! Each request spawns a fetch on the current tokio runtime. Completions come
//! back over an unbounded channel that the reader loop drains into
//! `Reconciler::on_resource_loaded`, so the reconciler itself never awaits.
//! `http` and `https` locators are fetched; `data:` URIs carrying a base64
//! `image/*` payload are unpacked in place. Bytes are kept raw and never
//! decoded as images.

#[cfg(test)]
#[path = "loader_test.rs"]
mod loader_test;

use std::time::Duration;

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::asset::AssetId;
use crate::reader::ResourceLoader;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to build http client: {0}")]
    ClientBuild(String),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is not an image (content type {content_type:?})")]
    NotAnImage { url: String, content_type: Option<String> },
    #[error("malformed data uri: {0}")]
    DataUri(String),
}

/// Raw image payload plus its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Result of one load, tagged with the asset and URL it was requested for.
#[derive(Debug)]
pub struct LoadCompletion<R> {
    pub id: AssetId,
    pub url: String,
    pub result: Result<R, LoadError>,
}

// =============================================================================
// LOADER
// =============================================================================

pub struct HttpImageLoader {
    http: reqwest::Client,
    completions: mpsc::UnboundedSender<LoadCompletion<ImageBlob>>,
}

impl HttpImageLoader {
    /// Build a loader and the receiver its completions arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<LoadCompletion<ImageBlob>>), LoadError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LoadError::ClientBuild(e.to_string()))?;
        let (completions, rx) = mpsc::unbounded_channel();
        Ok((Self { http, completions }, rx))
    }
}

impl ResourceLoader for HttpImageLoader {
    type Resource = ImageBlob;

    fn request(&mut self, id: AssetId, url: &str) {
        let http = self.http.clone();
        let completions = self.completions.clone();
        let url = url.to_owned();
        debug!(%id, %url, "loader: fetching");
        tokio::spawn(async move {
            let result = load_image(&http, &url).await;
            if completions.send(LoadCompletion { id, url, result }).is_err() {
                debug!(%id, "loader: reader gone, completion dropped");
            }
        });
    }
}

async fn load_image(http: &reqwest::Client, url: &str) -> Result<ImageBlob, LoadError> {
    if let Some(rest) = strip_data_scheme(url) {
        return decode_data_uri(url, rest);
    }
    fetch_image(http, url).await
}

async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<ImageBlob, LoadError> {
    check_scheme(url)?;

    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| LoadError::Request { url: url.to_owned(), reason: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "loader: fetch failed");
        return Err(LoadError::Status { url: url.to_owned(), status: status.as_u16() });
    }

    let declared = match response.headers().get(CONTENT_TYPE).map(|value| value.to_str()) {
        Some(Ok(value)) => Some(value.to_owned()),
        Some(Err(_)) | None => None,
    };
    let content_type = check_content_type(url, declared)?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| LoadError::Request { url: url.to_owned(), reason: e.to_string() })?;
    Ok(ImageBlob { content_type, bytes: bytes.to_vec() })
}

// =============================================================================
// CHECKS
// =============================================================================

fn check_scheme(url: &str) -> Result<(), LoadError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(LoadError::UnsupportedScheme(url.to_owned()))
    }
}

/// Accept only `image/*`, returning the media type without parameters.
fn check_content_type(url: &str, declared: Option<String>) -> Result<String, LoadError> {
    let parsed = declared.as_deref().map(str::parse::<mime::Mime>);
    match parsed {
        Some(Ok(media_type)) if media_type.type_() == mime::IMAGE => {
            Ok(media_type.essence_str().to_ascii_lowercase())
        }
        Some(Ok(media_type)) => {
            debug!(%url, %media_type, "loader: resource isn't an image");
            Err(LoadError::NotAnImage { url: url.to_owned(), content_type: declared })
        }
        Some(Err(_)) | None => Err(LoadError::NotAnImage { url: url.to_owned(), content_type: declared }),
    }
}

// =============================================================================
// DATA URIS
// =============================================================================

/// Body of a `data:` URI, with the scheme matched case-insensitively.
fn strip_data_scheme(url: &str) -> Option<&str> {
    let (scheme, rest) = url.split_once(':')?;
    scheme.eq_ignore_ascii_case("data").then_some(rest)
}

/// Unpack `data:<media type>;base64,<payload>`. Only base64 payloads are
/// accepted.
fn decode_data_uri(url: &str, rest: &str) -> Result<ImageBlob, LoadError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::DataUri("missing `,` before payload".to_owned()))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| LoadError::DataUri(format!("payload of `{header}` is not base64")))?;

    let declared = (!media_type.is_empty()).then(|| media_type.to_owned());
    let content_type = check_content_type("data uri", declared)?;

    let bytes = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| LoadError::DataUri(format!("bad base64 payload: {e}")))?;
    debug!(%content_type, len = bytes.len(), url_len = url.len(), "loader: unpacked data uri");
    Ok(ImageBlob { content_type, bytes })
}
