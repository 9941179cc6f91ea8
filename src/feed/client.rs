//! WebSocket client for Binance streams
//!
//! Handles connection, subscription, and in-order message delivery.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{RecorderError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channels recorded for a symbol: trades and 100ms depth deltas
pub fn channels_for(symbol: &str) -> Vec<String> {
    let symbol = symbol.to_lowercase();
    vec![format!("{}@trade", symbol), format!("{}@depth@100ms", symbol)]
}

/// Combined-stream URL for `channels` on `endpoint`
pub fn stream_url(endpoint: &str, channels: &[String]) -> String {
    format!(
        "{}?streams={}",
        endpoint.trim_end_matches('/'),
        channels.join("/")
    )
}

/// Subscription request sent after connecting
#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    method: &'static str,
    params: &'a [String],
    id: u64,
}

/// What the delivery loop should do after a message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Continue,
    Stop,
}

/// Receiver of inbound feed messages.
///
/// Called on the delivery task only, one message at a time.
#[cfg_attr(test, mockall::automock)]
pub trait MessageHandler {
    fn on_message(&mut self, raw: &str) -> Result<Delivery>;
}

/// Requests a [`FeedClient`] close from another task.
///
/// Closing is idempotent; the delivery task notices the request before it
/// takes the next frame and tears the transport down itself.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// WebSocket client for a single symbol
pub struct FeedClient {
    stream: Option<WsStream>,
    shutdown: CancellationToken,
    next_request_id: u64,
}

impl FeedClient {
    /// Connect to the combined stream for `symbol`. No retry on failure.
    pub async fn connect(endpoint: &str, symbol: &str) -> Result<Self> {
        let url = stream_url(endpoint, &channels_for(symbol));

        info!(url = %url, "Connecting to Binance WebSocket");

        let (ws_stream, response) = connect_async(url.as_str()).await.map_err(|e| {
            RecorderError::ConnectionError(format!("Failed to connect to {}: {}", url, e))
        })?;

        info!(status = ?response.status(), "WebSocket connected");

        Ok(Self {
            stream: Some(ws_stream),
            shutdown: CancellationToken::new(),
            next_request_id: 1,
        })
    }

    /// Send a SUBSCRIBE request for `channels`; does not wait for the ack
    pub async fn subscribe(&mut self, channels: &[String]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| RecorderError::ConnectionError("Not connected".to_string()))?;

        let request = SubscribeRequest {
            method: "SUBSCRIBE",
            params: channels,
            id: self.next_request_id,
        };
        let payload = serde_json::to_string(&request).map_err(|e| {
            RecorderError::ConnectionError(format!("Failed to encode subscription: {}", e))
        })?;

        stream.send(Message::Text(payload)).await?;
        self.next_request_id += 1;

        info!(channels = ?channels, id = request.id, "Subscription request sent");
        Ok(())
    }

    /// Receive the next text message.
    ///
    /// Control frames are handled here and never surface. Returns `Ok(None)`
    /// once the client was closed locally; a peer close, stream end or
    /// transport error is a [`RecorderError::ConnectionError`].
    pub async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };

            let frame = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                frame = stream.next() => Some(frame),
            };

            let Some(frame) = frame else {
                self.close().await;
                return Ok(None);
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "Received text message");
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data).map(Some).map_err(|e| {
                        RecorderError::ParseError(format!("Binary frame is not UTF-8: {}", e))
                    });
                }
                Some(Ok(Message::Ping(data))) => {
                    debug!("Received ping, sending pong");
                    if let Some(stream) = self.stream.as_mut() {
                        if let Err(e) = stream.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to send pong");
                        }
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!("Received pong");
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "Received close frame");
                    self.stream = None;
                    return Err(RecorderError::ConnectionError(
                        "Connection closed by peer".to_string(),
                    ));
                }
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    self.stream = None;
                    return Err(RecorderError::ConnectionError(e.to_string()));
                }
                None => {
                    warn!("WebSocket stream ended");
                    self.stream = None;
                    return Err(RecorderError::ConnectionError(
                        "Stream ended".to_string(),
                    ));
                }
            }
        }
    }

    /// Deliver every inbound message to `handler`, in arrival order, until
    /// the handler stops, the client is closed, or the transport fails.
    ///
    /// A handler error closes the connection and is returned as is.
    pub async fn deliver<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: MessageHandler + ?Sized,
    {
        while let Some(raw) = self.recv().await? {
            match handler.on_message(&raw) {
                Ok(Delivery::Continue) => {}
                Ok(Delivery::Stop) => break,
                Err(e) => {
                    self.close().await;
                    return Err(e);
                }
            }
        }

        self.close().await;
        Ok(())
    }

    /// Handle for closing this client from another task
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection; idempotent
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!(error = %e, "Error while closing WebSocket");
            }
            info!("Connection closed");
        }
    }
}
