use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use super::auth::AuthUser;
use super::db_status;
use super::types::*;
use crate::db::{DbError, OrderRepo, ProfileRepo, RegionRepo};
use crate::server::AppState;

/// Places an order. Without an explicit region code the buyer's preferred
/// region is used, and without that the order stays unassigned.
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderReceipt>), StatusCode> {
    let region_id = match req.region.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => match state.db.get_region_by_code(code).await {
            Ok(region) => Some(region.id),
            Err(DbError::NotFound(_)) => return Err(StatusCode::BAD_REQUEST),
            Err(e) => return Err(db_status(e)),
        },
        None => match state.db.get_profile(&user.id).await {
            Ok(profile) => profile.region_id,
            Err(DbError::NotFound(_)) => None,
            Err(e) => return Err(db_status(e)),
        },
    };

    let order = state
        .db
        .create_order(&user.id, region_id, &req.items, chrono::Utc::now())
        .await
        .map_err(db_status)?;
    let items = state
        .db
        .list_order_items(order.id)
        .await
        .map_err(db_status)?;

    info!(order = order.id, total = order.total, "Order placed");

    Ok((StatusCode::CREATED, Json(OrderReceipt { order, items })))
}
