//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /health | GET | 健康检查 | 无 |
//!
//! ```json
//! { "status": "ok", "version": "0.1.0", "epoch": "…", "subscribers": 3, "paymentProvider": "stripe" }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    /// 每次启动生成，看板据此判断是否需要全量刷新
    epoch: String,
    subscribers: usize,
    payment_provider: &'static str,
    foods: usize,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        epoch: state.orders.epoch().to_string(),
        subscribers: state.bus.subscriber_count(),
        payment_provider: state.checkout.provider_name(),
        foods: state.catalog.len(),
    })
}
