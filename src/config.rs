//! Client configuration parsed from environment variables.

use crate::asset::CanvasSize;
use crate::relay::DEFAULT_MAX_RECONNECT_ATTEMPTS;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3000";
pub const DEFAULT_ASSET_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_CANVAS_WIDTH: f64 = 1920.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 1080.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got `{value}`")]
    Parse { key: &'static str, expected: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub relay_url: String,
    pub asset_base_url: String,
    /// Consecutive failed connects before a relay channel gives up; 0 = never.
    pub max_reconnect_attempts: u32,
    pub canvas: CanvasSize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            asset_base_url: DEFAULT_ASSET_BASE_URL.to_owned(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            canvas: CanvasSize::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `IMGFLOAT_RELAY_URL`: default `ws://127.0.0.1:3000`
    /// - `IMGFLOAT_ASSET_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `IMGFLOAT_MAX_RECONNECT_ATTEMPTS`: default `0` (retry forever)
    /// - `IMGFLOAT_CANVAS_WIDTH` / `IMGFLOAT_CANVAS_HEIGHT`: default 1920×1080
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a numeric variable does not parse
    /// or a canvas dimension is not positive.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup<E>(lookup: impl Fn(&str) -> Result<String, E>) -> Result<Self, ConfigError> {
        let var = |key: &str| match lookup(key) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
            Ok(_) | Err(_) => None,
        };

        let relay_url = var("IMGFLOAT_RELAY_URL")
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let asset_base_url = var("IMGFLOAT_ASSET_BASE_URL")
            .unwrap_or_else(|| DEFAULT_ASSET_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let max_reconnect_attempts = match var("IMGFLOAT_MAX_RECONNECT_ATTEMPTS") {
            Some(raw) => parse_u32("IMGFLOAT_MAX_RECONNECT_ATTEMPTS", &raw)?,
            None => DEFAULT_MAX_RECONNECT_ATTEMPTS,
        };
        let width = match var("IMGFLOAT_CANVAS_WIDTH") {
            Some(raw) => parse_dimension("IMGFLOAT_CANVAS_WIDTH", &raw)?,
            None => DEFAULT_CANVAS_WIDTH,
        };
        let height = match var("IMGFLOAT_CANVAS_HEIGHT") {
            Some(raw) => parse_dimension("IMGFLOAT_CANVAS_HEIGHT", &raw)?,
            None => DEFAULT_CANVAS_HEIGHT,
        };

        Ok(Self { relay_url, asset_base_url, max_reconnect_attempts, canvas: CanvasSize::new(width, height) })
    }
}

fn parse_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.parse::<u32>()
        .map_err(|_| ConfigError::Parse { key, expected: "a non-negative integer", value: raw.to_owned() })
}

fn parse_dimension(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ConfigError::Parse { key, expected: "a positive number of pixels", value: raw.to_owned() }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
