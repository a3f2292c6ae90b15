use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::live::NotificationHub;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LiveQuery {
    /// Also receive `scoreboard-update` events for this contest.
    pub contest_id: Option<i32>,
}

/// Push channel. Frames are JSON `{"event": ..., "data": ...}`.
#[instrument(skip_all, fields(user_id = auth_user.user_id, contest_id = ?query.contest_id))]
pub async fn live(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if let Some(contest_id) = query.contest_id {
        state
            .storage
            .find_contest(contest_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Contest not found".into()))?;
    }

    let hub = state.hub.clone();
    let user_id = auth_user.user_id;
    Ok(ws.on_upgrade(move |socket| run_session(socket, hub, user_id, query.contest_id)))
}

async fn run_session(
    socket: WebSocket,
    hub: Arc<NotificationHub>,
    user_id: i32,
    contest_id: Option<i32>,
) {
    let mut session = hub.connect(user_id);
    if let Some(contest_id) = contest_id {
        hub.join_room(contest_id, session.id);
    }

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = session.events.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, event = event.name(), "Failed to encode live event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(session_id = %session.id, "Live socket closed");
    hub.disconnect(session.id);
}
