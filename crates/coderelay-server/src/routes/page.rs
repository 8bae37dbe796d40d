//! Page session socket: bus messages in, page commands out.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use coderelay_core::{BusMessage, CaptureBus};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/page", get(page_socket))
}

/// GET /api/page: WebSocket for one page session.
async fn page_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_page(socket, state))
}

async fn run_page(socket: WebSocket, state: Arc<AppState>) {
    let (id, mut commands) = match state.router.attach_page() {
        Ok(attached) => attached,
        Err(e) => {
            warn!("Page session rejected: {}", e);
            return;
        }
    };
    let bus = state.router.for_session(id);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Error encoding page command: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Page session {} socket error: {}", id, e);
                        break;
                    }
                };
                let message: BusMessage = match serde_json::from_str(text.as_str()) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Malformed bus message from page {}: {}", id, e);
                        continue;
                    }
                };
                let reply = match bus.publish(message) {
                    Ok(ack) => serde_json::to_string(&ack),
                    Err(e) => {
                        warn!("Bus message not delivered: {}", e);
                        break;
                    }
                };
                if let Ok(reply) = reply {
                    if sink.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = state.router.detach_page(id) {
        debug!("Page {} detach not delivered: {}", id, e);
    }
}
