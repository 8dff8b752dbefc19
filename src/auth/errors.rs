//! Authentication rejection.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::bearer::BEARER_SCHEME;
use crate::token::TokenError;

/// Request rejected because its auth token is missing or invalid.
///
/// The reason is kept for logging only; every rejection renders the same
/// `401` with a `WWW-Authenticate: Bearer` challenge.
#[derive(Debug)]
pub struct Unauthenticated {
    pub reason: TokenError,
}

impl From<TokenError> for Unauthenticated {
    fn from(reason: TokenError) -> Self {
        Self { reason }
    }
}

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(BEARER_SCHEME),
        );
        response
    }
}
