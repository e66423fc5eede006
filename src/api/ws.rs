// =============================================================================
// WebSocket Handler — presenter redraw feed
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate full StateSnapshot on connect.
//   2. A redraw hint `{type:"redraw", view, state_version}` whenever a poll
//      task lands fresh data, so the presenter repaints only that view
//      (refetching it from the matching REST endpoint).
//
// A client that falls behind the hint channel gets a fresh full snapshot
// instead of the hints it missed. Ping frames are answered with Pong; the
// connection cleans up on close.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app_state::{DashboardState, StateSnapshot};
use crate::types::View;

/// Outbound message envelope.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsOutbound {
    Snapshot(StateSnapshot),
    Redraw { view: View, state_version: u64 },
}

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DashboardState>>,
) -> impl IntoResponse {
    debug!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
async fn handle_ws_connection(socket: WebSocket, state: Arc<DashboardState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut hints = state.subscribe_redraw();

    // Send the initial full snapshot immediately.
    if let Err(e) = send_outbound(&mut sender, &WsOutbound::Snapshot(state.build_snapshot())).await
    {
        warn!(error = %e, "failed to send initial WebSocket snapshot");
        return;
    }
    info!("presenter connected");

    loop {
        tokio::select! {
            // ── Redraw hints from the poll tasks ────────────────────────
            hint = hints.recv() => {
                let outbound = match hint {
                    Ok(view) => WsOutbound::Redraw {
                        view,
                        state_version: state.current_state_version(),
                    },
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "presenter lagged behind hints — resending snapshot");
                        WsOutbound::Snapshot(state.build_snapshot())
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = send_outbound(&mut sender, &outbound).await {
                    debug!(error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
            }

            // ── Incoming client messages ────────────────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("presenter closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Text/Binary/Pong from the client carry no meaning
                        // on this read-only feed.
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    info!("presenter disconnected");
}

async fn send_outbound(
    sender: &mut SplitSink<WebSocket, Message>,
    outbound: &WsOutbound,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(outbound)?;
    sender.send(Message::Text(payload)).await?;
    Ok(())
}
