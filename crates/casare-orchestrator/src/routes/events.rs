use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::debug;

use crate::state::AppState;

/// `GET /events` (§6 Event stream): a WebSocket clients subscribe to for
/// job-state transitions. Frames are synthesized by `crate::poller`, not
/// forwarded live from any single agent's `casare_engine::EventBus` — the
/// orchestrator never holds a connection to an agent process.
pub async fn events_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
  ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
  let mut rx = state.events.subscribe();
  loop {
    tokio::select! {
      frame = rx.recv() => {
        match frame {
          Ok(frame) => {
            let payload = match serde_json::to_string(&frame) {
              Ok(payload) => payload,
              Err(err) => { debug!(error = %err, "dropping unserializable event frame"); continue }
            };
            if socket.send(Message::Text(payload)).await.is_err() {
              break;
            }
          }
          Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
            debug!(skipped, "event subscriber lagged, dropping oldest frames");
          }
          Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
      }
      message = socket.recv() => {
        match message {
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => {}
          Some(Err(_)) => break,
        }
      }
    }
  }
}
