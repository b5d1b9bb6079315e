//! In-process notification listener
//!
//! Writes every notification to the structured log. Runs as a background
//! task, so a failure here never reaches the publisher.

use std::sync::Arc;

use shared::message::OrderNotification;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// 通知日志监听器（阻塞直到关闭或通道关闭）
pub async fn run_notification_logger(
    mut rx: broadcast::Receiver<Arc<OrderNotification>>,
    shutdown: CancellationToken,
) {
    tracing::info!("Notification logger started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Notification logger stopping");
                break;
            }
            result = rx.recv() => match result {
                Ok(n) => log_notification(&n),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Notification bus closed, logger stopping");
                    break;
                }
            }
        }
    }
}

fn log_notification(n: &OrderNotification) {
    tracing::info!(
        target: "order_server::notifications",
        event = %n.event,
        order_id = %n.order_id,
        counter = n.counter,
        scope = ?n.scope,
        order_status = ?n.order_status,
        item_id = ?n.item_id,
        item_status = ?n.item_status,
        "Order notification"
    );
}
