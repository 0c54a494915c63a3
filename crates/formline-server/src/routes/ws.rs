//! WebSocket hub endpoints.
//!
//! Hub sockets are listen-only: the server pushes JSON-encoded
//! [`HubEvent`]s and answers pings, nothing a client sends changes state.
//! Group membership is fixed at connect time; dropping the socket is the
//! only way out, and the registry prunes the membership on close.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use formline_hub::{ConnectionId, FanoutHub, HubEvent};

use crate::auth::{admin_identity, extract_token};
use crate::error::ServerError;
use crate::state::AppState;

/// Query parameters for the session-facing hub.
#[derive(Debug, Default, Deserialize)]
pub struct FormsHubParams {
    pub session_id: Option<String>,
}

/// GET /hubs/forms - session-facing event stream.
///
/// With a `session_id` the connection joins that session's group. Without
/// one the socket stays open but receives nothing; the client can reconnect
/// with an id once it has a session.
pub async fn forms_hub_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<FormsHubParams>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        match params.session_id {
            Some(session_id) => {
                let (id, rx) = state.hub.join_session(&session_id);
                debug!(%session_id, connection = ?id, "forms hub connection joined");
                pump(socket, state.hub.clone(), id, rx).await;
            }
            None => {
                debug!("forms hub connection without session id");
                drain(socket).await;
            }
        }
    })
}

/// Query parameters for the admin hub.
#[derive(Debug, Default, Deserialize)]
pub struct AdminHubParams {
    pub access_token: Option<String>,
}

/// GET /hubs/admin - admin event stream.
///
/// Browsers cannot attach headers to WebSocket upgrades, so the token may
/// arrive as an `access_token` query parameter as well as the usual header
/// or cookie. The admin check happens before the upgrade completes.
pub async fn admin_hub_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<AdminHubParams>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let token = params
        .access_token
        .or_else(|| extract_token(&headers, &state.config))
        .ok_or(ServerError::Unauthorized)?;
    let identity = state.resolver.resolve_token(&token)?;
    if !identity.is_admin() {
        return Err(ServerError::Unauthorized);
    }

    Ok(ws.on_upgrade(move |socket| async move {
        let (id, rx) = state.hub.join_admins();
        debug!(user_id = identity.user_id, connection = ?id, "admin hub connection joined");
        pump(socket, state.hub.clone(), id, rx).await;
    }))
}

/// Forward hub events to the socket until either side goes away.
async fn pump(
    socket: WebSocket,
    hub: Arc<FanoutHub>,
    id: ConnectionId,
    mut rx: UnboundedReceiver<HubEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        debug!(error = %e, "dropping unencodable hub event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.leave(id);
    debug!(connection = ?id, "hub connection closed");
}

/// Hold a groupless socket open, answering pings, until the client leaves.
async fn drain(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Ping(payload)) => {
                if sender.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
