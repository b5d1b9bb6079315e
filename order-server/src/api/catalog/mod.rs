//! Catalog API - kiosk food listing

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use shared::models::Food;

use crate::catalog::CatalogReader;
use crate::core::ServerState;
use crate::utils::{ApiResponse, ok};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/catalog/foods", get(list_foods))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodQuery {
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
}

async fn list_foods(
    State(state): State<ServerState>,
    Query(query): Query<FoodQuery>,
) -> Json<ApiResponse<Vec<Food>>> {
    let foods = state
        .catalog
        .list_foods()
        .into_iter()
        .filter(|f| query.category_id.is_none() || f.category_id == query.category_id)
        .filter(|f| query.sub_category_id.is_none() || f.sub_category_id == query.sub_category_id)
        .collect();
    ok(foods)
}
