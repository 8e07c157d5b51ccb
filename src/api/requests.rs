use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    Form, Json,
};
use tracing::{debug, info};

use super::auth::AuthUser;
use super::db_status;
use super::types::*;
use crate::db::{MovieRequestRepo, VoteRepo};
use crate::server::AppState;

const MY_REQUESTS_PATH: &str = "/api/requests";
const COMMUNITY_REQUESTS_PATH: &str = "/api/requests/all";

pub async fn my_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MyRequests>, StatusCode> {
    let my_requests = state
        .db
        .list_requests_by_user(&user.id)
        .await
        .map_err(db_status)?;

    Ok(Json(MyRequests {
        title: "Movie Requests".to_string(),
        my_requests,
    }))
}

pub async fn requests_action(
    State(state): State<AppState>,
    user: AuthUser,
    Form(form): Form<RequestActionForm>,
) -> Result<Redirect, StatusCode> {
    match form.action.as_str() {
        "create" => {
            let name = form.name.trim();
            let description = form.description.trim();
            if !name.is_empty() && !description.is_empty() {
                let id = state
                    .db
                    .create_request(&user.id, name, description)
                    .await
                    .map_err(db_status)?;
                info!(request = id, "Movie request created");
            }
        }
        "delete" => {
            if let Some(raw) = form.request_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                let id = raw.parse::<i64>().map_err(|_| StatusCode::NOT_FOUND)?;
                state
                    .db
                    .delete_request(id, &user.id)
                    .await
                    .map_err(db_status)?;
            }
        }
        other => debug!(action = other, "Unknown request action"),
    }

    Ok(Redirect::to(MY_REQUESTS_PATH))
}

pub async fn community_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CommunityRequests>, StatusCode> {
    let listed = state
        .db
        .list_requests_with_votes()
        .await
        .map_err(db_status)?;
    let voted: HashSet<i64> = state
        .db
        .voted_request_ids(&user.id)
        .await
        .map_err(db_status)?
        .into_iter()
        .collect();

    let requests = listed
        .into_iter()
        .map(|r| CommunityRequest {
            voted: voted.contains(&r.id),
            id: r.id,
            name: r.name,
            description: r.description,
            username: r.username,
            created_at: r.created_at.to_rfc3339(),
            vote_count: r.vote_count,
        })
        .collect();

    Ok(Json(CommunityRequests {
        title: "Community Requests".to_string(),
        requests,
    }))
}

pub async fn toggle_request_vote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Redirect, StatusCode> {
    let outcome = state
        .db
        .toggle_vote(id, &user.id)
        .await
        .map_err(db_status)?;
    debug!(request = id, ?outcome, "Vote toggled");

    Ok(Redirect::to(COMMUNITY_REQUESTS_PATH))
}
