// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback websocket server for driving real-time connections in tests.
//!
//! Each accepted client is handed to the test as a [`ServerConnection`] so
//! the test can push frames, read what the client sent, close cleanly or
//! drop the socket without a close handshake.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::debug;

/// How long `accept()` and `recv_text()` wait before giving up.
const WAIT: Duration = Duration::from_secs(5);

/// A websocket server bound to an ephemeral loopback port.
pub struct TestWsServer {
    url: String,
    accepted: mpsc::Receiver<ServerConnection>,
    task: JoinHandle<()>,
}

impl TestWsServer {
    /// Bind to `127.0.0.1:0` and start accepting clients.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, accepted) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                match accept_async(stream).await {
                    Ok(ws) => {
                        debug!(%peer, "test server accepted client");
                        if tx.send(ServerConnection { ws }).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(%peer, error = %e, "test server handshake failed"),
                }
            }
        });

        Ok(Self {
            url: format!("ws://{addr}/"),
            accepted,
            task,
        })
    }

    /// The `ws://` URL clients should dial.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the next client to complete its handshake.
    ///
    /// # Panics
    ///
    /// Panics when no client connects within five seconds.
    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a client")
            .expect("test server stopped")
    }
}

impl Drop for TestWsServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Server side of one accepted client.
pub struct ServerConnection {
    ws: WebSocketStream<TcpStream>,
}

impl ServerConnection {
    /// Send a text frame to the client.
    ///
    /// # Panics
    ///
    /// Panics when the client is gone.
    pub async fn send_text(&mut self, text: impl Into<String>) {
        self.ws
            .send(Message::Text(text.into().into()))
            .await
            .expect("send to client");
    }

    pub async fn send_json(&mut self, value: &serde_json::Value) {
        self.send_text(value.to_string()).await;
    }

    /// Next text frame from the client, skipping pings and pongs.
    ///
    /// Returns `None` when the client closes or nothing arrives in time.
    pub async fn recv_text(&mut self) -> Option<String> {
        loop {
            let next = tokio::time::timeout(WAIT, self.ws.next()).await.ok()??;
            match next.ok()? {
                Message::Text(text) => return Some(text.to_string()),
                Message::Binary(bytes) => return String::from_utf8(bytes.to_vec()).ok(),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Next frame from the client decoded as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let text = self.recv_text().await?;
        serde_json::from_str(&text).ok()
    }

    /// Close with a proper close handshake.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Drop the TCP stream without a close frame.
    pub fn drop_abruptly(self) {
        drop(self.ws.into_inner());
    }
}
