//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::order::{
    Order, OrderStatus, OrderView, UpdateItemStatusRequest, UpdateOrderStatusRequest,
};

use crate::api::run_blocking;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

/// Query params for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub view: OrderView,
    pub status: Option<OrderStatus>,
}

/// List orders for the cook / server views
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let orders = run_blocking(&state, move |orders| {
        orders.list_orders(query.view, query.status)
    })
    .await?;
    Ok(ok(orders))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = run_blocking(&state, move |orders| orders.get_order(&id)).await?;
    Ok(ok(order))
}

/// Staff: advance the order status
///
/// `PAID` is only reachable through payment confirmation.
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    if payload.status == OrderStatus::Paid {
        return Err(AppError::validation(
            "PAID is set by payment confirmation, not by staff",
        )
        .with_detail("order_id", id));
    }
    let order = run_blocking(&state, move |orders| {
        orders.set_order_status(&id, payload.status)
    })
    .await?;
    Ok(ok(order))
}

/// Staff: move one item along its status graph
pub async fn update_item_status(
    State(state): State<ServerState>,
    Path((id, item_id)): Path<(String, String)>,
    Json(payload): Json<UpdateItemStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = run_blocking(&state, move |orders| {
        orders.set_order_item_status(&id, &item_id, payload.status)
    })
    .await?;
    Ok(ok(order))
}
