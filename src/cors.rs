//! CORS middleware for a single configured client origin.
//!
//! Answers preflight requests itself and adds the allow-origin headers to
//! every response for requests coming from the client origin. Requests from
//! other origins pass through without CORS headers.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::Url;

const ALLOWED_METHODS: &str = "GET, POST, PATCH, DELETE";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const PREFLIGHT_MAX_AGE_SECS: &str = "600";

/// The client origin, serialized the way browsers send it in `Origin`.
#[derive(Clone)]
pub struct CorsConfig {
    origin: HeaderValue,
}

impl CorsConfig {
    /// Returns `None` for URLs without a tuple origin (e.g. `file:`).
    pub fn new(client_origin: &Url) -> Option<Self> {
        let origin = client_origin.origin();
        if !origin.is_tuple() {
            return None;
        }
        let origin = HeaderValue::from_str(&origin.ascii_serialization()).ok()?;
        Some(Self { origin })
    }

    fn matches(&self, headers: &HeaderMap) -> bool {
        headers.get(header::ORIGIN) == Some(&self.origin)
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Middleware that adds CORS headers for the configured origin.
pub async fn cors_middleware(
    State(config): State<CorsConfig>,
    request: Request,
    next: Next,
) -> Response {
    let from_client = config.matches(request.headers());

    if from_client && is_preflight(&request) {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        config.apply(headers);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
        );
        return response;
    }

    let mut response = next.run(request).await;
    if from_client {
        config.apply(response.headers_mut());
    }
    response
}
