//! Rate limiting for the login and registration endpoints.
//!
//! Uses a token bucket per client IP to slow down password guessing and
//! signup spam.

use axum::{
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::info;

use crate::auth::extract_client_ip;

/// Default number of login/registration attempts per IP per minute.
pub const DEFAULT_AUTH_PER_MINUTE: u32 = 10;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    limiter: Arc<IpLimiter>,
    /// Header carrying the client IP when running behind a proxy.
    ip_header: Option<HeaderName>,
}

impl RateLimitConfig {
    /// Allow `per_minute` requests per IP, with the whole minute available as burst.
    /// Zero is treated as one.
    pub fn new(per_minute: u32, ip_header: Option<HeaderName>) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            ip_header,
        }
    }

    fn check(&self, request: &Request) -> bool {
        // Without a known address every caller shares one bucket.
        let ip = extract_client_ip(request, self.ip_header.as_ref())
            .unwrap_or_else(|| "unknown".to_string());
        match self.limiter.check_key(&ip) {
            Ok(_) => true,
            Err(_) => {
                info!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
                false
            }
        }
    }
}

/// Middleware for rate limiting login and registration.
pub async fn rate_limit_auth(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    if config.check(&request) {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Please wait before trying again.",
        )
            .into_response()
    }
}
