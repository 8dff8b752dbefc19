//! Bearer token parsing for the Authorization header.

use axum::http::{HeaderMap, header};

use super::cookie::{AUTH_COOKIE_NAME, get_cookie};

/// Scheme named in the `WWW-Authenticate` challenge.
pub const BEARER_SCHEME: &str = "Bearer";

/// Read the token out of an Authorization header value.
///
/// Returns an empty string unless the value is exactly `Bearer <token>`.
/// Callers treat every malformed value the same way (unauthenticated), so no
/// distinct error is reported.
pub fn read_bearer(header_value: &str) -> String {
    let mut parts = header_value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) if !token.is_empty() => token.to_string(),
        _ => String::new(),
    }
}

/// Read the auth token from the Authorization header, falling back to the
/// auth cookie. Empty when neither carries one.
pub fn read_auth_token(headers: &HeaderMap) -> String {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(read_bearer)
        .unwrap_or_default();

    if !from_header.is_empty() {
        return from_header;
    }

    get_cookie(headers, AUTH_COOKIE_NAME)
        .unwrap_or_default()
        .to_string()
}
