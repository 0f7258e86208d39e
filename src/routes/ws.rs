//! WebSocket upgrade + message loop. Client messages are parsed as JSON and
//! forwarded to the orchestrator; every state change is pushed as a `view` message.

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
  info!(target: "sysdesign_trainer", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: AppState) {
  info!(target: "sysdesign_trainer", "WebSocket connected");
  let mut views = state.orchestrator.subscribe();
  views.mark_changed();

  loop {
    let reply_msg = tokio::select! {
      changed = views.changed() => {
        if changed.is_err() {
          break;
        }
        let view = views.borrow_and_update().clone();
        ServerWsMessage::View { view }
      }
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(msg) => {
            debug!(target: "sysdesign_trainer", kind = msg.kind(), bytes = txt.len(), "WS received");
            handle_client_ws(msg, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
        Some(Ok(_)) => continue,
      },
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "sysdesign_trainer", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "sysdesign_trainer", "WebSocket disconnected");
}

#[instrument(level = "info", skip_all, fields(kind = msg.kind()))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let orch = &state.orchestrator;
  let result = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,
    ClientWsMessage::Snapshot => return ServerWsMessage::View { view: orch.snapshot() },
    ClientWsMessage::Select { question } => orch.select(question).await.map(|_| None),
    ClientWsMessage::Edit { section, text } => orch.edit(section, text).await.map(|_| None),
    ClientWsMessage::Grade => orch.grade().await.map(Some),
  };

  match result {
    Ok(Some(question)) => {
      info!(target: "scoring", "WS grade dispatched");
      ServerWsMessage::Grading { question }
    }
    // State changes arrive through the view subscription.
    Ok(None) => ServerWsMessage::View { view: orch.snapshot() },
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}
