// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection multiplexer that fans many tenant websockets into one stream.
//!
//! Each `open()` dials the tenant's endpoint and spawns a read task and a
//! write task for it. Read tasks forward every frame, tagged with its tenant,
//! to a shared mpsc channel consumed through [`ConnectionMultiplexer::next_frame`].
//! Reconnect-control frames are consumed by the read task itself.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_core::{ErrorHandler, InboundFrame, ParleyError, TenantId, default_error_handler};

use crate::frame::{FrameAction, TypingFrame, classify_frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fan-in buffer shared by all tenants.
const INBOUND_BUFFER: usize = 512;
/// Per-connection outbound buffer.
const OUTBOUND_BUFFER: usize = 64;

struct Connection {
    /// Distinguishes this connection from a later one for the same tenant.
    id: Uuid,
    endpoint: String,
    outbound: mpsc::Sender<WsMessage>,
    reader: JoinHandle<()>,
}

type ConnectionMap = Arc<Mutex<HashMap<TenantId, Connection>>>;

/// Owns one duplex connection per tenant.
pub struct ConnectionMultiplexer {
    connections: ConnectionMap,
    /// Cloned into each read task; taken on `close()` so the stream ends.
    inbound_tx: Mutex<Option<mpsc::Sender<InboundFrame>>>,
    inbound_rx: Mutex<mpsc::Receiver<InboundFrame>>,
    error_handler: ErrorHandler,
    cancel: CancellationToken,
}

impl Default for ConnectionMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMultiplexer {
    /// Create a multiplexer that logs connection errors.
    pub fn new() -> Self {
        Self::with_error_handler(default_error_handler())
    }

    /// Create a multiplexer reporting broken connections and undecodable
    /// frames to `error_handler`.
    pub fn with_error_handler(error_handler: ErrorHandler) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(inbound_rx),
            error_handler,
            cancel: CancellationToken::new(),
        }
    }

    /// Dial `endpoint` and start reading frames for `tenant`.
    ///
    /// Fails with `AlreadyConnected` when the tenant already has a connection
    /// and with `Transport` when the endpoint cannot be reached.
    pub async fn open(&self, tenant: TenantId, endpoint: &str) -> Result<(), ParleyError> {
        if self.connections.lock().await.contains_key(&tenant) {
            return Err(ParleyError::AlreadyConnected(tenant.to_string()));
        }

        let inbound = self
            .inbound_tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| ParleyError::Internal("multiplexer is closed".into()))?;

        let (ws, _response) = connect_async(endpoint)
            .await
            .map_err(|e| ParleyError::transport(tenant.as_str(), e))?;
        let (sink, stream) = ws.split();

        let mut connections = self.connections.lock().await;
        // Another open() for the same tenant may have won while we were dialing.
        if connections.contains_key(&tenant) {
            return Err(ParleyError::AlreadyConnected(tenant.to_string()));
        }

        let id = Uuid::new_v4();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(write_loop(
            tenant.clone(),
            sink,
            outbound_rx,
            self.cancel.child_token(),
        ));
        let reader = tokio::spawn(read_loop(
            ReadContext {
                tenant: tenant.clone(),
                id,
                inbound,
                connections: Arc::clone(&self.connections),
                error_handler: Arc::clone(&self.error_handler),
                cancel: self.cancel.child_token(),
            },
            stream,
        ));

        info!(tenant = %tenant, endpoint, "connection opened");
        connections.insert(
            tenant,
            Connection {
                id,
                endpoint: endpoint.to_string(),
                outbound,
                reader,
            },
        );
        Ok(())
    }

    /// Queue a text frame on the tenant's connection.
    ///
    /// Fails with `NotFound` when the tenant has no connection.
    pub async fn send(&self, tenant: &TenantId, payload: String) -> Result<(), ParleyError> {
        let outbound = self
            .connections
            .lock()
            .await
            .get(tenant)
            .map(|c| c.outbound.clone())
            .ok_or_else(|| ParleyError::not_found("connection", tenant.as_str()))?;

        outbound
            .send(WsMessage::Text(payload.into()))
            .await
            .map_err(|_| {
                ParleyError::transport(
                    tenant.as_str(),
                    std::io::Error::other("connection writer stopped"),
                )
            })
    }

    /// Send a typing indicator for `room` on the tenant's connection.
    pub async fn typing(&self, tenant: &TenantId, room: &str) -> Result<(), ParleyError> {
        let frame = serde_json::to_string(&TypingFrame::new(room))?;
        self.send(tenant, frame).await
    }

    /// Next frame from any tenant, in per-connection order.
    ///
    /// Returns `None` once the multiplexer is closed and all buffered frames
    /// have been consumed.
    pub async fn next_frame(&self) -> Option<InboundFrame> {
        self.inbound_rx.lock().await.recv().await
    }

    /// The endpoint currently tracked for `tenant`, after any redirects.
    pub async fn endpoint(&self, tenant: &TenantId) -> Option<String> {
        self.connections
            .lock()
            .await
            .get(tenant)
            .map(|c| c.endpoint.clone())
    }

    pub async fn is_connected(&self, tenant: &TenantId) -> bool {
        self.connections.lock().await.contains_key(tenant)
    }

    pub async fn tenants(&self) -> Vec<TenantId> {
        self.connections.lock().await.keys().cloned().collect()
    }

    /// Stop all read loops and end the fan-in stream.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.inbound_tx.lock().await.take();

        let drained: Vec<(TenantId, Connection)> =
            self.connections.lock().await.drain().collect();
        for (tenant, conn) in drained {
            if let Err(e) = conn.reader.await {
                warn!(tenant = %tenant, error = %e, "read task ended abnormally");
            }
        }
        info!("multiplexer closed");
    }
}

struct ReadContext {
    tenant: TenantId,
    id: Uuid,
    inbound: mpsc::Sender<InboundFrame>,
    connections: ConnectionMap,
    error_handler: ErrorHandler,
    cancel: CancellationToken,
}

async fn read_loop(ctx: ReadContext, mut stream: SplitStream<WsStream>) {
    let ReadContext {
        tenant,
        id,
        inbound,
        connections,
        error_handler,
        cancel,
    } = ctx;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let payload = match next {
            None => {
                debug!(tenant = %tenant, "connection stream ended");
                break;
            }
            Some(Ok(WsMessage::Text(text))) => text.to_string(),
            Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    error_handler(ParleyError::decode(e));
                    continue;
                }
            },
            Some(Ok(WsMessage::Close(frame))) => {
                info!(tenant = %tenant, ?frame, "connection closed by remote");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break,
            Some(Err(e)) => {
                warn!(tenant = %tenant, error = %e, "connection read failed");
                error_handler(ParleyError::transport(tenant.as_str(), e));
                break;
            }
        };

        match classify_frame(&payload) {
            Ok(FrameAction::Reconnect(url)) => {
                let mut connections = connections.lock().await;
                if let Some(conn) = connections.get_mut(&tenant).filter(|c| c.id == id) {
                    debug!(tenant = %tenant, endpoint = %url, "endpoint redirected");
                    conn.endpoint = url;
                }
                continue;
            }
            Ok(FrameAction::Forward) => {}
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "dropping undecodable frame");
                error_handler(ParleyError::decode(e));
                continue;
            }
        }

        let frame = InboundFrame {
            tenant: tenant.clone(),
            payload,
        };
        let delivered = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = inbound.send(frame) => sent.is_ok(),
        };
        if !delivered {
            break;
        }
    }

    let mut connections = connections.lock().await;
    if connections.get(&tenant).is_some_and(|c| c.id == id) {
        connections.remove(&tenant);
        info!(tenant = %tenant, "connection removed");
    }
}

async fn write_loop(
    tenant: TenantId,
    mut sink: SplitSink<WsStream, WsMessage>,
    mut outbound: mpsc::Receiver<WsMessage>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            msg = outbound.recv() => msg,
        };
        let Some(msg) = msg else { break };

        if let Err(e) = sink.send(msg).await {
            warn!(tenant = %tenant, error = %e, "connection write failed");
            break;
        }
    }
    // Best effort; the peer may already be gone.
    let _ = sink.close().await;
}
