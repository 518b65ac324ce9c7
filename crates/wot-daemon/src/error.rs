//! HTTP error responses and admin authentication.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::{AppState, BuildConflict, RegistryError};

/// Error returned by a handler, rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateSeeder(_) => ApiError::Conflict(err.to_string()),
            RegistryError::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            RegistryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RegistryError::Db(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<wot_db::DbError> for ApiError {
    fn from(err: wot_db::DbError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<BuildConflict> for ApiError {
    fn from(err: BuildConflict) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

/// Bearer token from the `Authorization` header. The scheme is matched
/// case-insensitively and surrounding whitespace is ignored.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = auth.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Compare tokens through their hashes so the comparison time does not
/// depend on where they differ.
pub fn token_matches(presented: &str, expected: &str) -> bool {
    blake3::hash(presented.as_bytes()) == blake3::hash(expected.as_bytes())
}

/// Middleware guarding admin routes.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        tracing::debug!("admin request rejected, no admin token configured");
        return ApiError::Unauthorized.into_response();
    };
    match extract_bearer_token(request.headers()) {
        Some(token) if token_matches(&token, expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "admin request with invalid token");
            ApiError::Unauthorized.into_response()
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "admin request missing bearer token");
            ApiError::Unauthorized.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(
            extract_bearer_token(&headers("Bearer abc123")).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            extract_bearer_token(&headers("  bearer   abc123  ")).as_deref(),
            Some("abc123")
        );
        assert_eq!(extract_bearer_token(&headers("Basic abc123")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cre"));
        assert!(!token_matches("", "s3cret"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(BuildConflict).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RegistryError::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
