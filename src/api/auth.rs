use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
    Form, Json,
};
use std::collections::HashMap;
use tracing::{error, info};

use super::db_status;
use super::types::*;
use crate::db::{AccessToken, AccessTokenRepo, DbError, ProfileRepo, RegionRepo, User, UserRepo};
use crate::server::AppState;

/// The user a request's access token belongs to.
///
/// Put into the request extensions by [`auth_middleware`]; extracting it from
/// a request without a valid token fails with 401, which is the login gate.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub token: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_token(&req, &params);

    if let Some(token_str) = token {
        if let Ok(token) = state.db.get_token(&token_str).await {
            req.extensions_mut().insert(AuthUser {
                id: token.userid,
                token: token.token,
            });
        }
    }

    Ok(next.run(req).await)
}

fn extract_token<B>(req: &Request<B>, params: &HashMap<String, String>) -> Option<String> {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(token) = req
        .headers()
        .get("X-Session-Token")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
    {
        return Some(token);
    }

    params.get("api_key").cloned()
}

async fn hash_password(password: String, cost: u32) -> Result<String, StatusCode> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Result<(StatusCode, Json<UserInfo>), (StatusCode, Json<FormErrors>)> {
    let internal = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(FormErrors { errors: vec!["Internal error".to_string()] }),
        )
    };

    let username = form.username.trim().to_string();
    let mut errors = Vec::new();

    if username.is_empty() {
        errors.push("Username is required.".to_string());
    }
    if form.password1.is_empty() {
        errors.push("Password is required.".to_string());
    } else if form.password1 != form.password2 {
        errors.push("The two password fields didn't match.".to_string());
    }

    let region = match form.region.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => match state.db.get_region_by_code(code).await {
            Ok(region) => Some(region),
            Err(DbError::NotFound(_)) => {
                errors.push("Select a valid region.".to_string());
                None
            }
            Err(_) => return Err(internal()),
        },
        None => None,
    };

    if !username.is_empty() {
        match state.db.get_user(&username).await {
            Ok(_) => errors.push("A user with that username already exists.".to_string()),
            Err(DbError::NotFound(_)) => {}
            Err(_) => return Err(internal()),
        }
    }

    if !errors.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(FormErrors { errors })));
    }

    let password = hash_password(form.password1, state.config.auth.bcrypt_cost)
        .await
        .map_err(|_| internal())?;

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username,
        password,
        created: Some(chrono::Utc::now()),
        lastlogin: None,
    };

    match state.db.create_user(&user).await {
        Ok(()) => {}
        Err(DbError::AlreadyExists(_)) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(FormErrors {
                    errors: vec!["A user with that username already exists.".to_string()],
                }),
            ))
        }
        Err(_) => return Err(internal()),
    }

    // Every user gets a profile right after creation.
    state
        .db
        .create_profile(&user.id, region.map(|r| r.id))
        .await
        .map_err(|_| internal())?;

    info!(username = %user.username, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(UserInfo {
            id: user.id,
            username: user.username,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResult>, StatusCode> {
    let username = form.username.trim();

    let user = match state.db.get_user(username).await {
        Ok(user) => user,
        Err(DbError::NotFound(_)) => return Err(StatusCode::UNAUTHORIZED),
        Err(e) => return Err(db_status(e)),
    };

    if !verify_password(form.password, user.password.clone()).await {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = AccessToken {
        token: uuid::Uuid::new_v4().to_string(),
        userid: user.id.clone(),
        created: Some(chrono::Utc::now()),
    };

    state.db.upsert_token(&token).await.map_err(db_status)?;
    state.db.touch_lastlogin(&user.id).await.map_err(db_status)?;

    Ok(Json(LoginResult {
        user: UserInfo {
            id: user.id,
            username: user.username,
        },
        access_token: token.token,
    }))
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode, StatusCode> {
    state.db.delete_token(&user.token).await.map_err(db_status)?;
    Ok(StatusCode::NO_CONTENT)
}
