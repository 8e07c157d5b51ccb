use axum::{extract::State, http::StatusCode, response::Redirect, Form, Json};

use super::auth::AuthUser;
use super::db_status;
use super::types::*;
use crate::db::{DbError, ProfileRepo, RegionRepo, UserRepo};
use crate::popularity::RegionInfo;
use crate::server::AppState;

pub async fn list_regions(State(state): State<AppState>) -> Result<Json<Vec<RegionInfo>>, StatusCode> {
    let regions = state.db.list_regions().await.map_err(db_status)?;
    Ok(Json(regions.iter().map(RegionInfo::from).collect()))
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileView>, StatusCode> {
    let account = state.db.get_user_by_id(&user.id).await.map_err(db_status)?;

    let region_id = match state.db.get_profile(&user.id).await {
        Ok(profile) => profile.region_id,
        Err(DbError::NotFound(_)) => None,
        Err(e) => return Err(db_status(e)),
    };
    let region = match region_id {
        Some(id) => Some(state.db.get_region(id).await.map_err(db_status)?),
        None => None,
    };

    Ok(Json(ProfileView {
        username: account.username,
        region: region.as_ref().map(RegionInfo::from),
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, StatusCode> {
    let region_id = match form.region.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => match state.db.get_region_by_code(code).await {
            Ok(region) => Some(region.id),
            Err(DbError::NotFound(_)) => return Err(StatusCode::BAD_REQUEST),
            Err(e) => return Err(db_status(e)),
        },
        None => None,
    };

    state
        .db
        .set_profile_region(&user.id, region_id)
        .await
        .map_err(db_status)?;

    Ok(Redirect::to("/api/profile"))
}
