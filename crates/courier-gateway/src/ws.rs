// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint for live dashboard updates.
//!
//! Clients connect to `/ws?organization_id=…&user_id=…&token=…`. The token is
//! checked before the upgrade. After that the socket is push-only:
//!
//! ```json
//! {"event": "campaign_stats", "payload": {"campaign_id": "...", "sent_count": 3, ...}}
//! {"event": "sla_breach", "payload": {"transfer_id": "...", "kind": "pickup", ...}}
//! ```
//!
//! Client text frames are ignored. The connection closes when the client
//! closes it or when the hub drops it for falling behind.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::server::GatewayState;

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub organization_id: String,
    pub user_id: String,
    pub token: String,
}

pub async fn ws_handler(
    State(state): State<GatewayState>,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !state.auth.accepts(&params.token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if params.organization_id.is_empty() || params.user_id.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, params: WsParams) {
    let mut registration = match state
        .hub
        .register(&params.organization_id, &params.user_id)
        .await
    {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(error = %e, "refusing WebSocket connection");
            return;
        }
    };
    let id = registration.id;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            frame = registration.frames.recv() => match frame {
                Some(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unregister(id).await;
    tracing::debug!(connection_id = id, user_id = %params.user_id, "WebSocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_require_all_fields() {
        let ok: WsParams = serde_json::from_str(
            r#"{"organization_id": "acme", "user_id": "u1", "token": "t"}"#,
        )
        .unwrap();
        assert_eq!(ok.organization_id, "acme");
        assert!(serde_json::from_str::<WsParams>(r#"{"organization_id": "acme"}"#).is_err());
    }
}
