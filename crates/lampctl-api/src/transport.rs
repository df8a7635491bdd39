// Duplex frame transport to a lamp device.
//
// `Connector` opens connections, `Transport` moves whole frames over one.
// The WebSocket implementation is the only one shipped; tests and other
// front ends can plug in their own through the traits.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{Error, ProtocolError};
use crate::protocol::frame_as_hex;

/// An open, bidirectional frame stream.
pub trait Transport: Send + 'static {
    /// Write a single frame.
    fn send(&mut self, frame: Vec<u8>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Read the next frame. `Ok(None)` means the peer closed the stream.
    ///
    /// Must be cancel-safe: dropping the future before it resolves may not
    /// lose a frame, since sessions race it against outgoing requests.
    fn receive(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send;

    /// Close the stream. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory for [`Transport`]s. Opening is the only blocking negotiation step.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn open(&self, address: &str) -> impl Future<Output = Result<Self::Transport, Error>> + Send;
}

// ── WebSocket ────────────────────────────────────────────────────────

/// Opens WebSocket connections (`ws://` or `wss://`).
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn open(&self, address: &str) -> Result<WsTransport, Error> {
        let url = Url::parse(address)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::ConnectFailed {
                address: address.to_owned(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        tracing::debug!(%url, timeout_secs = self.connect_timeout.as_secs(), "opening WebSocket");

        let connect = tokio_tungstenite::connect_async(url.as_str());
        let (stream, _response) = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(Error::ConnectFailed {
                    address: address.to_owned(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::ConnectFailed {
                    address: address.to_owned(),
                    reason: format!("timed out after {}s", self.connect_timeout.as_secs()),
                });
            }
        };

        tracing::info!(%url, "WebSocket connected");
        Ok(WsTransport {
            stream,
            closed: false,
        })
    }
}

/// A connected WebSocket carrying binary frames.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl Transport for WsTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        tracing::trace!(frame = %frame_as_hex(&frame), "send");
        self.stream
            .send(Message::binary(frame))
            .await
            .map_err(map_ws_error)
    }

    async fn receive(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if self.closed {
            return Ok(None);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    tracing::trace!(frame = %frame_as_hex(&data), "receive");
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                    }
                    self.closed = true;
                    return Ok(None);
                }
                Some(Ok(Message::Text(_))) => {
                    return Err(Error::Protocol(ProtocolError::NotBinary));
                }
                Some(Ok(_)) => {
                    // Ping / Pong / raw Frame -- tungstenite answers pings itself
                }
                Some(Err(e)) => return Err(map_ws_error(e)),
                None => {
                    tracing::info!("WebSocket stream ended");
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "error while closing WebSocket (ignored)");
        }
    }
}

fn map_ws_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Error::Closed,
        other => Error::Transport(other.to_string()),
    }
}
