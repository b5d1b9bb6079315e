//! 员工鉴权中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::Method;

use crate::core::ServerState;
use crate::utils::AppError;

/// 无需员工令牌的请求
///
/// - `OPTIONS *` (CORS 预检)
/// - `GET` / `HEAD` (看板读取与订阅)
/// - 非 `/api/` 路径
/// - `POST /api/checkout`、`POST /api/orders/{id}/checkout` (自助点餐)
/// - `POST /api/payments/webhook` (支付回调，签名另行校验)
pub fn is_public_route(method: &Method, path: &str) -> bool {
    if method == Method::OPTIONS || method == Method::GET || method == Method::HEAD {
        return true;
    }
    if !path.starts_with("/api/") {
        return true;
    }
    if method != Method::POST {
        return false;
    }
    if path == "/api/checkout" || path == "/api/payments/webhook" {
        return true;
    }
    // /api/orders/{id}/checkout
    matches!(
        path.strip_prefix("/api/orders/")
            .and_then(|rest| rest.strip_suffix("/checkout")),
        Some(id) if !id.is_empty() && !id.contains('/')
    )
}

/// 常量时间比较
fn token_matches(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 员工鉴权中间件
///
/// 未配置 `STAFF_TOKEN` 时放行所有请求 (仅开发环境允许)。
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 无 Authorization 头 | 401 NotAuthenticated |
/// | 令牌错误 | 401 TokenInvalid |
pub async fn require_staff(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.staff_token.as_deref() else {
        return Ok(next.run(req).await);
    };
    if is_public_route(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(header) = auth_header else {
        tracing::warn!(method = %req.method(), uri = %req.uri(), "Staff token missing");
        return Err(AppError::unauthorized());
    };
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?;

    if !token_matches(token.trim(), expected) {
        tracing::warn!(method = %req.method(), uri = %req.uri(), "Staff token rejected");
        return Err(AppError::invalid_token("Invalid staff token"));
    }
    Ok(next.run(req).await)
}
