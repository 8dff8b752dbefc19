//! Token extraction and authentication rejections.
//!
//! Tokens travel either in an `Authorization: Bearer` header or in cookies
//! set by the login and state-issuing endpoints.

mod bearer;
mod cookie;
mod errors;
mod ip;

pub use bearer::{BEARER_SCHEME, read_auth_token, read_bearer};
pub use cookie::{AUTH_COOKIE_NAME, STATE_COOKIE_NAME, get_cookie, token_cookie};
pub use errors::Unauthenticated;
pub use ip::extract_client_ip;
