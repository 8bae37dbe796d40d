//! Display subscriber socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/display", get(display_socket))
}

/// GET /api/display: WebSocket receiving status and mirrored captures.
async fn display_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_display(socket, state))
}

async fn run_display(socket: WebSocket, state: Arc<AppState>) {
    let (id, mut events) = match state.router.subscribe_display() {
        Ok(subscribed) => subscribed,
        Err(e) => {
            warn!("Display subscriber rejected: {}", e);
            return;
        }
    };
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Error encoding display event: {}", e),
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Err(e) = state.router.unsubscribe_display(id) {
        debug!("Display {} unsubscribe not delivered: {}", id, e);
    }
}
