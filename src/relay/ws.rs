//! Websocket connector for the production relay.
//!
//! Links are opened against `{relay}/ws/{write|read}/{channel}` and carry one
//! JSON sync message per text frame. `http(s)` base URLs are accepted and
//! mapped onto `ws(s)`.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use super::{Connector, Link, RelayError, Role};

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connects to a relay over websockets as either writer or reader.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
    role: Role,
}

impl WsConnector {
    /// Build a connector for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidUrl`] unless the URL uses `ws`, `wss`,
    /// `http`, or `https`.
    pub fn new(base_url: &str, role: Role) -> Result<Self, RelayError> {
        Ok(Self { base_url: ws_base_url(base_url)?, role })
    }

    /// Full endpoint for `channel`.
    #[must_use]
    pub fn channel_url(&self, channel: &str) -> String {
        format!("{}/ws/{}/{}", self.base_url, self.role.path_segment(), channel)
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, channel: &str) -> Result<Box<dyn Link>, RelayError> {
        let url = self.channel_url(channel);
        debug!(%url, "ws: connecting");
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| RelayError::Connect { channel: channel.to_owned(), reason: e.to_string() })?;
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WsStream,
}

#[async_trait::async_trait]
impl Link for WsLink {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RelayError::Send(e.to_string()))
    }

    async fn recv_text(&mut self) -> Option<Result<String, RelayError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(RelayError::Receive(e.to_string()))),
            };
            match msg {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Close(_) => return None,
                Message::Binary(_) => warn!("ws: ignoring binary frame"),
                _ => {}
            }
        }
    }
}

fn ws_base_url(base_url: &str) -> Result<String, RelayError> {
    let trimmed = base_url.trim_end_matches('/');

    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(trimmed.to_owned());
    }
    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}"));
    }

    Err(RelayError::InvalidUrl(base_url.to_owned()))
}
