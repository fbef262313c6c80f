//! Per-connection handler
//!
//! Each accepted socket gets a reader loop (this task) and a writer task
//! draining the connection's bounded outbound queue. Closing the connection
//! cancels both and removes it from the registry, its group, and the rate
//! limiter before the handler returns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use da_core::Channel;
use da_protocol::Envelope;

use crate::dispatch::Flow;
use crate::registry::{ConnectionId, Outbound};
use crate::state::RelayState;

/// How long a closing connection may take to flush queued frames
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run one connection to completion
pub async fn serve_connection(
    socket: WebSocket,
    channel: Channel,
    peer_addr: Option<SocketAddr>,
    state: Arc<RelayState>,
    cancel: CancellationToken,
) {
    let (tx, rx) = mpsc::channel(state.config.outbound_queue_capacity);
    let conn = state.registry.register(channel, peer_addr, tx);
    let id = conn.id;
    let conn_cancel = cancel.child_token();

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, rx, conn_cancel.clone(), id));

    loop {
        tokio::select! {
            _ = conn_cancel.cancelled() => {
                tracing::debug!("Connection handler cancelled for {}", id);
                break;
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => match Envelope::parse(&text) {
                        Ok(envelope) => {
                            if state.dispatcher.dispatch(&conn, &envelope) == Flow::Close {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("Ignoring malformed frame from {}: {}", id, e);
                        }
                    },
                    Some(Ok(WsMessage::Binary(data))) => {
                        tracing::debug!("Ignoring {}-byte binary frame from {}", data.len(), id);
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::debug!("{} closed: {:?}", id, frame);
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Connection {} closed with error: {}", id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(id);
    drop(conn);

    // With the last sender gone the writer flushes what is queued and exits
    if !join_or_abort(&mut writer, WRITER_DRAIN_TIMEOUT).await {
        tracing::debug!("Writer for {} did not drain in time, aborted", id);
    }
    conn_cancel.cancel();
}

/// Wait up to `limit` for `writer` to finish, aborting it otherwise.
///
/// A writer stuck in `send` to a peer that stopped reading never reaches its
/// cancellation point, so it has to be aborted. Returns whether it finished
/// on its own.
async fn join_or_abort(writer: &mut JoinHandle<()>, limit: Duration) -> bool {
    if tokio::time::timeout(limit, &mut *writer).await.is_ok() {
        return true;
    }
    writer.abort();
    false
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    id: ConnectionId,
) {
    loop {
        let outbound = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "relay shutting down".into(),
                    })))
                    .await;
                break;
            }
            outbound = rx.recv() => outbound,
        };

        match outbound {
            Some(Outbound::Text(text)) => {
                if let Err(e) = sink.send(WsMessage::Text(text.to_string())).await {
                    tracing::debug!("Send to {} failed: {}", id, e);
                    break;
                }
            }
            Some(Outbound::Close(reason)) => {
                let _ = sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::POLICY,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
            None => {
                let _ = sink.close().await;
                break;
            }
        }
    }

    tracing::trace!("Writer stopped for {}", id);
}
