//! Upstream WebSocket transport
//!
//! A connector opens one session and hands back a pair of channels: text to
//! send upstream, and events read from upstream. The mirror owns the retry
//! policy; a connector only ever makes a single attempt.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

use crate::mirror::MirrorError;

const OUTBOUND_CAPACITY: usize = 32;
const INBOUND_CAPACITY: usize = 1024;

/// Something read from the upstream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// One text frame, untouched.
    Frame(String),
    /// The session ended cleanly or the stream ran dry.
    Closed,
    /// The session failed.
    Failed(String),
}

/// Channels for one live upstream session.
///
/// The session ends with exactly one `Closed` or `Failed` event. Dropping
/// `outbound` closes the write half.
#[derive(Debug)]
pub struct UpstreamLink {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<UpstreamEvent>,
}

/// Opens upstream sessions.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Make a single connection attempt.
    async fn connect(&self) -> Result<UpstreamLink, MirrorError>;
}

/// Connector over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    url: String,
}

impl TungsteniteConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl UpstreamConnector for TungsteniteConnector {
    async fn connect(&self) -> Result<UpstreamLink, MirrorError> {
        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| MirrorError::Transport(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<UpstreamEvent>(INBOUND_CAPACITY);

        // Writer: runs until the mirror drops its sender.
        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    let _ = writer_events.send(UpstreamEvent::Failed(e.to_string())).await;
                    break;
                }
            }
            let _ = write.close().await;
            trace!("Upstream writer finished");
        });

        // Reader: always finishes with a terminal event.
        tokio::spawn(async move {
            let terminal = loop {
                let event = match read.next().await {
                    None => break UpstreamEvent::Closed,
                    Some(Ok(Message::Text(text))) => UpstreamEvent::Frame(text.to_string()),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => UpstreamEvent::Frame(text),
                        Err(_) => {
                            warn!(len = bytes.len(), "Dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Upstream sent close frame");
                        break UpstreamEvent::Closed;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break UpstreamEvent::Failed(e.to_string()),
                };
                if event_tx.send(event).await.is_err() {
                    return;
                }
            };
            let _ = event_tx.send(terminal).await;
        });

        Ok(UpstreamLink {
            outbound: out_tx,
            inbound: event_rx,
        })
    }
}
