//! Bearer token guard for the `/admin` routes.
//!
//! With `admin_token` unset every request passes. Otherwise the request must carry
//! `Authorization: Bearer <admin_token>`.

use crate::AppState;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub(crate) async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = match state.config.admin_token.as_deref() {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => return next.run(request).await,
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match auth_header {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(provided) if constant_time_compare(provided.as_bytes(), expected.as_bytes()) => {
                next.run(request).await
            }
            Some(_) => {
                tracing::warn!(target: "dspace::gateway", path = %request.uri().path(), "invalid admin token");
                unauthorized("Invalid admin token")
            }
            None => (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({
                    "success": false,
                    "error": "Invalid Authorization header format. Expected: Bearer <token>",
                })),
            )
                .into_response(),
        },
        None => unauthorized("Missing Authorization header"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "success": false, "error": message })),
    )
        .into_response()
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_app;
    use crate::tests::{get_request, test_state};
    use axum::body::Body;
    use tower::ServiceExt;

    fn with_auth(uri: &str, value: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"secret", b"secret"));
        assert!(!constant_time_compare(b"secret", b"secreT"));
        assert!(!constant_time_compare(b"secret", b"secret2"));
    }

    #[tokio::test]
    async fn test_admin_requires_token_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path(), Some("s3cret")).await);

        let res = app.clone().oneshot(get_request("/admin/knowledge")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(with_auth("/admin/knowledge", "Bearer wrong"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(with_auth("/admin/knowledge", "Basic s3cret"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(with_auth("/admin/knowledge", "Bearer s3cret"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // public routes stay open
        let res = app.oneshot(get_request("/api/menu-display")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_open_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path(), None).await);
        let res = app.oneshot(get_request("/admin/menu")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
