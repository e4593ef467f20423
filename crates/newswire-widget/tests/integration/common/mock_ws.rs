//! Mock news feed server for integration tests.
//!
//! Provides a WebSocket server that can:
//! - Answer `auth` frames with `auth_success` or `auth_error`
//! - Answer `ping` with `pong`
//! - Push feed frames and close connections with chosen codes
//! - Record received text frames

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// How the server answers `auth`.
#[derive(Debug, Clone)]
pub enum AuthReply {
    Accept,
    Reject(String),
}

#[derive(Debug, Clone)]
enum Command {
    Send(String),
    Close(u16),
}

/// A scripted news feed server.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<Command>,
    messages: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockWsServer {
    /// Start a new server on an available port.
    pub async fn start(auth: AuthReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (commands, _) = broadcast::channel(64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let commands_clone = commands.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            auth.clone(),
                            commands_clone.subscribe(),
                            messages_clone.clone(),
                            connections_clone.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            commands,
            messages,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    /// Received frames whose `type` is `auth`.
    pub async fn auth_frames(&self) -> Vec<serde_json::Value> {
        self.received_messages()
            .await
            .iter()
            .filter_map(|m| serde_json::from_str::<serde_json::Value>(m).ok())
            .filter(|v| v["type"] == "auth")
            .collect()
    }

    /// Push a text frame to every open connection.
    pub fn push(&self, frame: serde_json::Value) {
        let _ = self.commands.send(Command::Send(frame.to_string()));
    }

    /// Close every open connection with `code`.
    pub fn close_all(&self, code: u16) {
        let _ = self.commands.send(Command::Close(code));
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    auth: AuthReply,
    mut commands: broadcast::Receiver<Command>,
    messages: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {e}");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    messages.lock().await.push(text.clone());

                    if text == "ping" {
                        let _ = write.send(Message::Text("pong".to_string())).await;
                        continue;
                    }

                    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                        continue;
                    };
                    if parsed["type"] == "auth" {
                        let reply = match &auth {
                            AuthReply::Accept => serde_json::json!({
                                "type": "auth_success",
                                "exchange_id": "mock-exchange"
                            }),
                            AuthReply::Reject(error) => serde_json::json!({
                                "type": "auth_error",
                                "error": error
                            }),
                        };
                        let _ = write.send(Message::Text(reply.to_string())).await;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Ok(Command::Send(text)) => {
                    let _ = write.send(Message::Text(text)).await;
                }
                Ok(Command::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: Cow::Borrowed(""),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    break;
                }
                Err(_) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start(AuthReply::Accept).await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
