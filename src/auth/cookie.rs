//! Cookie parsing and `Set-Cookie` building for tokens.

use axum::http::header;
use chrono::{DateTime, Utc};

/// Cookie name for the auth token.
pub const AUTH_COOKIE_NAME: &str = "auth-token";

/// Cookie name for the state token.
pub const STATE_COOKIE_NAME: &str = "state-token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build a `Set-Cookie` value whose expiry matches the token it carries.
///
/// With `secure` the cookie is sent cross-site (`SameSite=None; Secure`), which
/// the browser client needs when served from another origin over HTTPS.
pub fn token_cookie(name: &str, token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let same_site = if secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    };
    format!(
        "{}={}; Path=/; Expires={}; HttpOnly; {}",
        name,
        token,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        same_site
    )
}
