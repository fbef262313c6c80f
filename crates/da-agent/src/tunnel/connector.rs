//! Outbound WebSocket connection to the relay

use std::time::Duration;

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use da_core::error::ConnectionError;
use da_core::DaError;
use da_protocol::{Envelope, Message};

/// Frames queued for the writer task.
///
/// Only the session loop and its heartbeat write, so a small buffer is
/// plenty.
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

/// How long `close` waits for queued frames to flush
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Cloneable handle for sending on a link
#[derive(Clone)]
pub struct LinkSender {
    tx: mpsc::Sender<String>,
}

impl LinkSender {
    /// Queue a message for the relay
    pub async fn send(&self, message: &Message) -> Result<(), DaError> {
        let text = message.to_json()?;
        self.tx
            .send(text)
            .await
            .map_err(|_| ConnectionError::ConnectionLost("writer stopped".to_string()))?;
        Ok(())
    }
}

/// An open connection to one relay channel
pub struct ActiveLink {
    url: String,
    sender: LinkSender,
    stream: SplitStream<WsStream>,
    writer: JoinHandle<()>,
}

impl ActiveLink {
    /// Connect to `url`, giving up after `connect_timeout`
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, ConnectionError> {
        tracing::debug!("Connecting to {}", url);
        let (ws, _response) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| ConnectionError::Timeout(url.to_string()))?
            .map_err(|e| ConnectionError::ConnectionRefused(format!("{}: {}", url, e)))?;

        let (mut sink, stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);

        let writer_url = url.to_string();
        let writer = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    tracing::debug!("Write to {} failed: {}", writer_url, e);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        Ok(Self {
            url: url.to_string(),
            sender: LinkSender { tx },
            stream,
            writer,
        })
    }

    /// URL this link is connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Handle for other tasks to send on this link
    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    /// Queue a message for the relay
    pub async fn send(&self, message: &Message) -> Result<(), DaError> {
        self.sender.send(message).await
    }

    /// Next JSON object from the relay, or `None` once it closed.
    ///
    /// Frames that are not JSON objects are skipped.
    pub async fn recv(&mut self) -> Result<Option<Envelope>, ConnectionError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => match Envelope::parse(&text) {
                    Ok(envelope) => return Ok(Some(envelope)),
                    Err(e) => tracing::debug!("Ignoring malformed frame from relay: {}", e),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::debug!("Relay closed {}: {:?}", self.url, frame);
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ConnectionError::ConnectionLost(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    /// Flush queued frames and close.
    ///
    /// Senders cloned from this link must be dropped first or the flush
    /// waits for the timeout.
    pub async fn close(self) {
        let Self { sender, writer, .. } = self;
        drop(sender);
        if !join_or_abort(writer, CLOSE_TIMEOUT).await {
            tracing::debug!("Writer did not finish within {:?}, aborted", CLOSE_TIMEOUT);
        }
    }
}

/// Wait up to `limit` for `writer`, aborting it if it is stuck in a send.
/// Returns whether it finished on its own.
async fn join_or_abort(mut writer: JoinHandle<()>, limit: Duration) -> bool {
    if tokio::time::timeout(limit, &mut writer).await.is_ok() {
        return true;
    }
    writer.abort();
    false
}
