//! Status board API

use axum::{Json, Router, extract::State, routing::get};
use shared::order::AggregateCounters;

use crate::api::run_blocking;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/board/counters", get(counters))
}

/// Pending / in-progress / completed ticket counters, recomputed per call
async fn counters(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<AggregateCounters>>> {
    let counters = run_blocking(&state, |orders| orders.aggregate_counters()).await?;
    Ok(ok(counters))
}
