pub mod auth;
pub mod dashboard;
pub mod movies;
pub mod orders;
pub mod profile;
pub mod requests;
pub mod types;

pub use auth::*;
pub use types::*;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::error;

use crate::db::DbError;
use crate::server::AppState;

pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(auth::signup))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/profile", get(profile::get_profile).post(profile::update_profile))
        .route("/api/regions", get(profile::list_regions))
        .route("/api/movies", get(movies::list_movies))
        .route("/api/movies/:id", get(movies::show_movie))
        .route("/api/movies/:id/reviews", post(movies::create_review))
        .route(
            "/api/movies/:id/reviews/:review_id/edit",
            get(movies::edit_review_form).post(movies::edit_review),
        )
        .route(
            "/api/movies/:id/reviews/:review_id/delete",
            post(movies::delete_review),
        )
        .route("/api/movies/:id/rating", post(movies::rate_movie))
        .route(
            "/api/requests",
            get(requests::my_requests).post(requests::requests_action),
        )
        .route("/api/requests/all", get(requests::community_requests))
        .route("/api/requests/:id/vote", post(requests::toggle_request_vote))
        .route("/api/orders", post(orders::place_order))
        .route("/api/popularity", get(dashboard::popularity))
}

/// Maps a repository error onto the response status for it.
pub(crate) fn db_status(e: DbError) -> StatusCode {
    match e {
        DbError::NotFound(_) => StatusCode::NOT_FOUND,
        DbError::Invalid(_) => StatusCode::BAD_REQUEST,
        DbError::AlreadyExists(_) => StatusCode::CONFLICT,
        DbError::Sqlx(e) => {
            error!("Database error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
