use axum::{extract::State, http::StatusCode, Json};

use super::auth::AuthUser;
use super::db_status;
use crate::db::{DbError, OrderRepo, ProfileRepo, RegionRepo};
use crate::popularity::{build_dashboard, PopularityDashboard};
use crate::server::AppState;

pub async fn popularity(
    State(state): State<AppState>,
    user: Option<AuthUser>,
) -> Result<Json<PopularityDashboard>, StatusCode> {
    let regions = state.db.list_regions().await.map_err(db_status)?;
    let items = state.db.list_line_items().await.map_err(db_status)?;

    let user_region_code = match &user {
        Some(user) => match state.db.get_profile(&user.id).await {
            Ok(profile) => profile
                .region_id
                .and_then(|id| regions.iter().find(|r| r.id == id))
                .map(|r| r.code.clone()),
            Err(DbError::NotFound(_)) => None,
            Err(e) => return Err(db_status(e)),
        },
        None => None,
    };

    let dashboard = build_dashboard(
        &regions,
        &items,
        user.as_ref().map(|u| u.id.as_str()),
        user_region_code,
        &state.dashboard_options(),
    );

    Ok(Json(dashboard))
}
