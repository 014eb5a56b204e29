//! HTTP and WebSocket routes
//!
//! - `GET /` health
//! - `GET /api/v1/status` orchestrator status and capabilities
//! - `GET /ws/avatar/:avatar_id` animation socket: JSON text in, binary
//!   batches and JSON control messages out

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use morphcast_core::{AvatarId, MorphcastError};
use morphcast_runtime::{ChannelSink, Outbound, SessionOrchestrator, StatusReport, WeakSessionHandle};
use morphcast_wire::Envelope;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub outbound_capacity: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/v1/status", get(status))
        .route("/ws/avatar/:avatar_id", get(avatar_socket))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "service": "morphcast",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.orchestrator.status())
}

async fn avatar_socket(
    ws: WebSocketUpgrade,
    Path(avatar_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_avatar(socket, AvatarId::new(avatar_id), state))
        .into_response()
}

async fn forward(socket: &mut WebSocket, item: Outbound) -> Result<(), axum::Error> {
    let message = match item {
        Outbound::Binary(bytes) => WsMessage::Binary(bytes.to_vec()),
        Outbound::Message(envelope) => match envelope.to_json() {
            Ok(text) => WsMessage::Text(text),
            Err(e) => {
                warn!(error = %e, "dropping unserializable message");
                return Ok(());
            }
        },
    };
    socket.send(message).await
}

fn owns(orchestrator: &SessionOrchestrator, avatar: &AvatarId, session: &WeakSessionHandle) -> bool {
    session
        .upgrade()
        .map_or(false, |session| orchestrator.owns(avatar, &session))
}

async fn serve_avatar(mut socket: WebSocket, avatar: AvatarId, state: AppState) {
    let orchestrator = state.orchestrator;
    let (sink, mut outbound) = ChannelSink::channel(avatar.clone(), state.outbound_capacity);
    // Weak, so a replaced or dropped session closes the outbound channel
    let session = match orchestrator.connect(avatar.clone(), Arc::new(sink)) {
        Ok(session) => Arc::downgrade(&session),
        Err(e) => {
            warn!(avatar = %avatar, error = %e, "connection refused");
            if let Ok(text) = Envelope::error(&e).to_json() {
                let _ = socket.send(WsMessage::Text(text)).await;
            }
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    // Replaced by a newer connection or dropped by the error budget
                    if !owns(&orchestrator, &avatar, &session) {
                        break;
                    }
                    if let Err(e) = orchestrator.handle_text(&avatar, &text) {
                        debug!(avatar = %avatar, code = e.code(), "message rejected");
                    }
                }
                Some(Ok(WsMessage::Binary(_))) => {
                    if !owns(&orchestrator, &avatar, &session) {
                        break;
                    }
                    let err = MorphcastError::InvalidMessage("binary input is not accepted".into());
                    orchestrator.report_error(&avatar, &err);
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(avatar = %avatar, error = %e, "socket error");
                    break;
                }
            },
            item = outbound.recv() => match item {
                Some(item) => {
                    if let Err(e) = forward(&mut socket, item).await {
                        debug!(avatar = %avatar, error = %e, "send failed");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if let Some(session) = session.upgrade() {
        orchestrator.release(&avatar, &session);
    }
    while let Ok(item) = outbound.try_recv() {
        if forward(&mut socket, item).await.is_err() {
            break;
        }
    }
    info!(avatar = %avatar, "socket closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphcast_core::ManualClock;
    use morphcast_runtime::{NullSink, RuntimeConfig};

    fn state() -> AppState {
        AppState {
            orchestrator: Arc::new(SessionOrchestrator::new(
                RuntimeConfig::default(),
                Arc::new(ManualClock::new(0.0)),
            )),
            outbound_capacity: 16,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "morphcast");
    }

    #[tokio::test]
    async fn test_status_reports_sessions_and_capabilities() {
        let state = state();
        state
            .orchestrator
            .connect(AvatarId::new("a1"), Arc::new(NullSink))
            .unwrap();
        let Json(report) = status(State(state)).await;
        assert_eq!(report.status, "operational");
        assert_eq!(report.active_sessions, 1);
        assert_eq!(report.capabilities.max_avatars, 10);
        assert_eq!(report.capabilities.protocols, vec!["websocket"]);
    }

    #[test]
    fn test_replaced_connection_loses_ownership() {
        let state = state();
        let avatar = AvatarId::new("a1");
        let first = state
            .orchestrator
            .connect(avatar.clone(), Arc::new(NullSink))
            .map(|session| Arc::downgrade(&session))
            .unwrap();
        assert!(owns(&state.orchestrator, &avatar, &first));

        let second = state.orchestrator.connect(avatar.clone(), Arc::new(NullSink)).unwrap();
        assert!(!owns(&state.orchestrator, &avatar, &first));
        assert!(first.upgrade().is_none());
        assert!(owns(&state.orchestrator, &avatar, &Arc::downgrade(&second)));
    }
}
