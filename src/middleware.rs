use axum::{
    extract::Request,
    http::uri::Uri,
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::api::AuthUser;

/// Collapses repeated slashes and drops a trailing slash, so `/api//movies/`
/// routes like `/api/movies`.
pub async fn normalize_path(mut req: Request, next: Next) -> Response {
    let uri = req.uri();
    let path = uri.path();

    let normalized = normalized_path(path);

    if normalized != path {
        let mut parts = uri.clone().into_parts();
        let new_path_and_query = if let Some(query) = uri.query() {
            format!("{}?{}", normalized, query)
        } else {
            normalized
        };

        if let Ok(new_uri) = new_path_and_query.parse::<Uri>() {
            parts.path_and_query = new_uri.into_parts().path_and_query;
            if let Ok(new_uri) = Uri::from_parts(parts) {
                *req.uri_mut() = new_uri;
            }
        }
    }

    next.run(req).await
}

fn normalized_path(path: &str) -> String {
    let mut normalized = path.to_string();

    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

/// Runs inside the token middleware, so the caller's user id is known.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user = request_user(&req);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let content_length = response
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    info!(
        method = %method,
        url = %uri,
        user = user.as_deref().unwrap_or("-"),
        status = status,
        length = content_length,
        "HTTP request"
    );

    response
}

fn request_user(req: &Request) -> Option<String> {
    req.extensions().get::<AuthUser>().map(|user| user.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_path() {
        assert_eq!(normalized_path("/api//movies"), "/api/movies");
        assert_eq!(normalized_path("/api/movies/"), "/api/movies");
        assert_eq!(normalized_path("///"), "/");
        assert_eq!(normalized_path("/api/movies/3"), "/api/movies/3");
    }

    #[test]
    fn test_request_user() {
        let mut req = axum::http::Request::builder()
            .uri("/api/profile")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(request_user(&req), None);

        req.extensions_mut().insert(AuthUser {
            id: "user-1".to_string(),
            token: "tok".to_string(),
        });
        assert_eq!(request_user(&req).as_deref(), Some("user-1"));
    }
}
