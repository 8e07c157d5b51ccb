use axum::{extract::Request, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;
use tower::Layer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::SqliteRepository;
use crate::popularity::DashboardOptions;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<SqliteRepository>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<SqliteRepository>) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            top_n: self.config.popularity.top_n,
            history_limit: self.config.popularity.history_limit,
            offset: self.config.display_offset(),
        }
    }
}

/// Routes plus per-request layers. Path normalisation has to happen before
/// routing, so [`build_app`] wraps it around this router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/robots.txt", get(robots_txt_handler))
        .merge(crate::api::build_api_router())
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::api::auth_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The service that gets served: path normalisation in front of
/// [`build_router`], wrapped back into a `Router` so any server accepts it.
pub fn build_app(state: AppState) -> Router {
    let normalized =
        axum::middleware::from_fn(crate::middleware::normalize_path).layer(build_router(state));
    Router::new().fallback_service(normalized)
}

async fn robots_txt_handler() -> &'static str {
    "User-agent: *\nDisallow: /\n"
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}
