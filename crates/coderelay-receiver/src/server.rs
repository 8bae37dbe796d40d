//! WebSocket listener for the receiver.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use coderelay_core::Result;

use crate::handler::{encode, handle_text};

/// Routes served by the receiver. The socket is accepted on `/`.
pub fn router() -> Router {
    Router::new().route("/", get(ws_upgrade))
}

/// Bind `addr` and serve until the task is dropped.
pub async fn run(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener) -> Result<()> {
    let local = listener.local_addr()?;
    info!("Receiver listening on ws://{}/", local);
    axum::serve(listener, router().into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer))
}

async fn handle_socket(socket: WebSocket, peer: SocketAddr) {
    info!("Client connected: {}", peer);
    let (mut sink, mut stream) = socket.split();

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Connection error from {}: {}", peer, e);
                break;
            }
        };
        debug!("Received message: {}", text);

        let replies = match tokio::task::spawn_blocking(move || handle_text(&text)).await {
            Ok(replies) => replies,
            Err(e) => {
                error!("Handler task failed: {}", e);
                continue;
            }
        };
        for reply in replies {
            let encoded = match encode(&reply) {
                Ok(s) => s,
                Err(e) => {
                    error!("Error encoding reply: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(encoded.into())).await {
                warn!("Error sending reply to {}: {}", peer, e);
                info!("Client disconnected: {}", peer);
                return;
            }
        }
    }
    info!("Client disconnected: {}", peer);
}
