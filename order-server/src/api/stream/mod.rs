//! Dashboard WebSocket endpoint
//!
//! GET /api/stream/{cook|server|status-board}
//!
//! 协议:
//! - Server → Dashboard: `DashboardCue` JSON (`{event, orderId, counter, alert}`)，加 30 秒 ping
//! - 消息只是提示，看板收到后重新拉取订单
//! - 订阅者处理太慢时会被断开，重连后全量刷新

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use futures::{SinkExt, StreamExt};
use shared::message::{DashboardCue, DashboardKind};
use tokio::time::Duration;

use crate::core::ServerState;
use crate::utils::AppError;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/stream/{kind}", get(handle_stream))
}

async fn handle_stream(
    State(state): State<ServerState>,
    Path(kind): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let kind: DashboardKind = kind.parse().map_err(AppError::invalid_request)?;
    Ok(ws.on_upgrade(move |socket| stream_session(socket, state, kind)))
}

async fn stream_session(socket: WebSocket, state: ServerState, kind: DashboardKind) {
    let (mut sink, mut stream) = socket.split();
    let mut subscription = state.bus.subscribe(kind);
    let subscriber_id = subscription.id();

    tracing::info!(dashboard = %kind, subscriber_id, "Dashboard connected");

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            cue = subscription.recv() => {
                match cue {
                    Some(cue) => {
                        if send_cue(&mut sink, &cue).await.is_err() {
                            break;
                        }
                    }
                    // Dropped by the bus (too slow) or bus closed
                    None => {
                        tracing::warn!(dashboard = %kind, subscriber_id, "Subscription ended by bus");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // 看板不发送命令，其余消息忽略
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(subscription);
    tracing::info!(dashboard = %kind, subscriber_id, "Dashboard disconnected");
}

async fn send_cue<S>(sink: &mut S, cue: &DashboardCue) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(cue).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize dashboard cue");
    })?;
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}
