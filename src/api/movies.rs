use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    Form, Json,
};
use tracing::debug;

use super::auth::AuthUser;
use super::db_status;
use super::types::*;
use crate::db::{DbError, MovieRepo, RatingRepo, Review, ReviewRepo};
use crate::server::AppState;

fn movie_redirect(id: i64) -> Redirect {
    Redirect::to(&format!("/api/movies/{}", id))
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<MovieSearch>,
) -> Result<Json<MovieIndex>, StatusCode> {
    let search = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let movies = state.db.list_movies(search).await.map_err(db_status)?;

    Ok(Json(MovieIndex {
        title: "Movies".to_string(),
        movies,
    }))
}

pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    user: Option<AuthUser>,
) -> Result<Json<MovieDetail>, StatusCode> {
    let movie = state.db.get_movie(id).await.map_err(db_status)?;
    let reviews = state.db.list_reviews(id).await.map_err(db_status)?;
    let rating = state.db.rating_summary(id).await.map_err(db_status)?;

    let user_rating = match user {
        Some(user) => match state.db.get_rating(id, &user.id).await {
            Ok(r) => Some(r.value),
            Err(DbError::NotFound(_)) => None,
            Err(e) => return Err(db_status(e)),
        },
        None => None,
    };

    Ok(Json(MovieDetail {
        title: movie.name.clone(),
        movie,
        reviews,
        rating,
        user_rating,
    }))
}

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, StatusCode> {
    let comment = form.comment.trim();
    if comment.is_empty() {
        return Ok(movie_redirect(id));
    }

    state.db.get_movie(id).await.map_err(db_status)?;
    state
        .db
        .create_review(id, &user.id, comment)
        .await
        .map_err(db_status)?;

    Ok(movie_redirect(id))
}

pub async fn edit_review_form(
    State(state): State<AppState>,
    user: AuthUser,
    Path((_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<Review>, StatusCode> {
    let review = state
        .db
        .get_own_review(review_id, &user.id)
        .await
        .map_err(db_status)?;
    Ok(Json(review))
}

pub async fn edit_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, review_id)): Path<(i64, i64)>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, StatusCode> {
    state
        .db
        .get_own_review(review_id, &user.id)
        .await
        .map_err(db_status)?;

    let comment = form.comment.trim();
    if !comment.is_empty() {
        state
            .db
            .update_review(review_id, &user.id, comment)
            .await
            .map_err(db_status)?;
    }

    Ok(movie_redirect(id))
}

pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, review_id)): Path<(i64, i64)>,
) -> Result<Redirect, StatusCode> {
    state
        .db
        .delete_review(review_id, &user.id)
        .await
        .map_err(db_status)?;
    Ok(movie_redirect(id))
}

/// Ratings outside 1..=5 or that are not integers are dropped without telling the user.
fn parse_rating(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|v| (1..=5).contains(v))
}

pub async fn rate_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Form(form): Form<RatingForm>,
) -> Result<Redirect, StatusCode> {
    state.db.get_movie(id).await.map_err(db_status)?;

    let Some(value) = parse_rating(&form.value) else {
        debug!(movie = id, value = %form.value, "Ignoring malformed rating");
        return Ok(movie_redirect(id));
    };

    state
        .db
        .upsert_rating(id, &user.id, value)
        .await
        .map_err(db_status)?;

    Ok(movie_redirect(id))
}
