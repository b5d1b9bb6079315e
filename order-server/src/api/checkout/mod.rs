//! Checkout API - kiosk order submission
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/checkout | POST | 创建订单并开启支付会话 |
//! | /api/orders/{id}/checkout | POST | 为待支付订单重新开启 (或取回) 支付会话 |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use shared::order::{CheckoutRequest, CheckoutResponse, OrderCheckoutRequest};

use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/checkout", post(submit))
        .route("/api/orders/{id}/checkout", post(retry))
}

async fn submit(
    State(state): State<ServerState>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = state
        .checkout
        .submit_checkout(payload.mode, payload.items)
        .await?;
    Ok(ok(resp))
}

async fn retry(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderCheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = state
        .checkout
        .create_checkout_session(&id, payload.items)
        .await?;
    Ok(ok(resp))
}
