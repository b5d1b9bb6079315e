//! API 路由模块
//!
//! | 模块 | 路由 | 说明 |
//! |------|------|------|
//! | [`health`] | `GET /health` | 健康检查 |
//! | [`catalog`] | `GET /api/catalog/foods` | 菜品目录 |
//! | [`checkout`] | `POST /api/checkout`, `POST /api/orders/{id}/checkout` | 自助点餐结账 |
//! | [`orders`] | `GET/PUT /api/orders/...` | 订单查询与员工状态操作 |
//! | [`board`] | `GET /api/board/counters` | 取餐号看板 |
//! | [`stream`] | `GET /api/stream/{kind}` | 看板 WebSocket 推送 |
//! | [`payments`] | `POST /api/payments/webhook` | 支付回调 |

pub mod board;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod stream;

use axum::Router;
use axum::middleware as axum_middleware;
use http::{HeaderName, HeaderValue};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;
use crate::orders::{ManagerResult, OrdersManager};
use crate::utils::{AppError, AppResult};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Public
        .merge(health::router())
        .merge(catalog::router())
        .merge(board::router())
        .merge(stream::router())
        // Kiosk checkout + provider callback (public, webhook signature checked)
        .merge(checkout::router())
        .merge(payments::router())
        // Reads public, mutations need the staff token
        .merge(orders::router())
}

/// Build a fully configured application with all middleware and state
///
/// Used by both the HTTP server and oneshot tests.
pub fn build_app(state: ServerState) -> Router {
    build_router()
        // Staff gate - innermost, runs right before the handler
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_staff,
        ))
        // Request logging
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        // Propagate request ID to response
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run blocking redb work on the blocking pool
pub(crate) async fn run_blocking<T, F>(state: &ServerState, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&OrdersManager) -> ManagerResult<T> + Send + 'static,
{
    let orders = state.orders.clone();
    tokio::task::spawn_blocking(move || f(&orders))
        .await
        .map_err(|e| AppError::internal(format!("blocking task failed: {e}")))?
        .map_err(AppError::from)
}
