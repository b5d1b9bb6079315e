//! Payment webhook handler
//!
//! POST /api/payments/webhook (raw body, needed for HMAC signature verification)

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};

use crate::checkout::webhook::SIGNATURE_HEADER;
use crate::checkout::CheckoutError;
use crate::core::ServerState;
use crate::orders::{ManagerError, PaymentOutcome};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payments/webhook", post(handle_webhook))
}

/// Provider retries on non-2xx, so only transient failures return 5xx
async fn handle_webhook(State(state): State<ServerState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let Some(sig_header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Missing Stripe-Signature header");
        return StatusCode::BAD_REQUEST;
    };

    match state.checkout.handle_webhook(&body, sig_header).await {
        Ok(Some(PaymentOutcome::Applied(order))) => {
            tracing::info!(order_id = %order.id, counter = order.counter, "Order paid");
            StatusCode::OK
        }
        Ok(Some(PaymentOutcome::AlreadyApplied(_))) | Ok(None) => StatusCode::OK,
        Err(CheckoutError::Webhook(e)) => {
            tracing::warn!(error = %e, "Webhook rejected");
            StatusCode::BAD_REQUEST
        }
        Err(CheckoutError::Manager(
            e @ (ManagerError::OrderNotFound(_)
            | ManagerError::CheckoutSessionNotFound(_)
            | ManagerError::Validation(_)),
        )) => {
            // 重试也不会成功，确认收到即可
            tracing::warn!(error = %e, "Webhook for unknown order or session ignored");
            StatusCode::OK
        }
        Err(CheckoutError::Manager(ManagerError::OrderAbandoned(order_id))) => {
            // 钱已收但计数器已释放，需人工退款
            tracing::error!(order_id = %order_id, "Payment confirmed for abandoned order, refund required");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook processing failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
