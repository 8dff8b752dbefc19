//! Registration and login. Neither route authenticates; both are rate limited.

use async_trait::async_trait;
use axum::{
    Router,
    extract::Request,
    middleware,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState, ResultExt, ValidationErrors, read_json, read_query, with_cookie};
use crate::db::is_unique_violation;
use crate::dispatch::{ApiHandler, HttpMethod, MethodHandler, RequestContext};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};
use crate::token::AuthClaims;

const USERNAME_MIN_LEN: usize = 5;
const USERNAME_MAX_LEN: usize = 15;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 64;

pub fn router(app: AppState, rate_limit: RateLimitConfig) -> Router {
    Router::new()
        .route(
            "/user/register",
            ApiHandler::new()
                .on(HttpMethod::Post, RegisterHandler { app: app.clone() })
                .into_route(),
        )
        .route(
            "/user/login",
            ApiHandler::new()
                .on(HttpMethod::Post, LoginHandler { app })
                .into_route(),
        )
        .layer(middleware::from_fn_with_state(rate_limit, rate_limit_auth))
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterQuery {
    invite_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    username: String,
    is_admin: bool,
    team_id: String,
}

fn validate_username(username: &str) -> Option<&'static str> {
    let len = username.chars().count();
    if len == 0 {
        return Some("Username cannot be empty.");
    }
    if len < USERNAME_MIN_LEN {
        return Some("Username cannot be shorter than 5 characters.");
    }
    if len > USERNAME_MAX_LEN {
        return Some("Username cannot be longer than 15 characters.");
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some("Username can contain only letters (a-z/A-Z) and digits (0-9).");
    }
    if username.starts_with(|c: char| c.is_ascii_digit()) {
        return Some("Username can start only with a letter (a-z/A-Z).");
    }
    None
}

fn validate_password(password: &str) -> Option<&'static str> {
    let len = password.chars().count();
    if len == 0 {
        return Some("Password cannot be empty.");
    }
    if len < PASSWORD_MIN_LEN {
        return Some("Password cannot be shorter than 8 characters.");
    }
    if len > PASSWORD_MAX_LEN {
        return Some("Password cannot be longer than 64 characters.");
    }
    if password.chars().any(char::is_whitespace) {
        return Some("Password cannot contain spaces.");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Some("Password must contain a lowercase letter (a-z).");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Some("Password must contain an uppercase letter (A-Z).");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain a digit (0-9).");
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some("Password must contain a symbol.");
    }
    None
}

fn validate_credentials(credentials: &Credentials) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();
    if let Some(msg) = validate_username(&credentials.username) {
        errors.insert("username", msg.to_string());
    }
    if let Some(msg) = validate_password(&credentials.password) {
        errors.insert("password", msg.to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Issue the auth cookie and the shared login/registration body.
fn signed_in(app: &AppState, claims: AuthClaims) -> Result<Response, ApiError> {
    let (token, cookie) = app.issue_auth(&claims)?;
    Ok(with_cookie(
        cookie,
        AuthResponse {
            token,
            username: claims.sub,
            is_admin: claims.is_admin,
            team_id: claims.team_id,
        },
    ))
}

struct RegisterHandler {
    app: AppState,
}

impl RegisterHandler {
    async fn register(&self, request: Request) -> Result<Response, ApiError> {
        let query: RegisterQuery = read_query(&request)?;
        let credentials: Credentials = read_json(request).await?;
        validate_credentials(&credentials)?;

        // An invited user joins the inviting team; everyone else founds one.
        let invited_team = match query.invite_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                let invite = self.app.tokens.decode_invite(&token).map_err(|e| {
                    info!(reason = %e, "Rejected invite token");
                    ApiError::invalid("inviteToken", "Invite link is invalid or has expired.")
                })?;
                Some(invite.into_claims().team_id)
            }
            None => None,
        };

        let password = credentials.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .internal_err("Failed to hash password")?
            .internal_err("Failed to hash password")?;

        let users = self.app.db.users();
        let username = credentials.username;
        let (created, is_admin, team_id) = match invited_team {
            Some(team_id) => {
                let created = users.create(&username, &password_hash, false, &team_id).await;
                (created, false, team_id)
            }
            None => {
                let team_id = uuid::Uuid::new_v4().to_string();
                let created = users
                    .create_with_team(&username, &password_hash, &team_id)
                    .await;
                (created, true, team_id)
            }
        };

        match created {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(ApiError::invalid("username", "Username is already taken."));
            }
            Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
        }

        info!(username = %username, team_id = %team_id, is_admin, "User registered");
        signed_in(&self.app, AuthClaims::new(username, is_admin, team_id))
    }
}

#[async_trait]
impl MethodHandler for RegisterHandler {
    async fn handle(&self, request: Request, _ctx: RequestContext) -> Response {
        self.register(request).await.into_response()
    }
}

struct LoginHandler {
    app: AppState,
}

impl LoginHandler {
    async fn login(&self, request: Request) -> Result<Response, ApiError> {
        let credentials: Credentials = read_json(request).await?;
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(ApiError::bad_request("Username and password are required."));
        }

        let invalid = || ApiError::bad_request("Invalid username or password.");

        let user = self
            .app
            .db
            .users()
            .get_by_username(&credentials.username)
            .await
            .db_err("Failed to get user")?
            .ok_or_else(invalid)?;

        let password = credentials.password;
        let hash = user.password_hash;
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .internal_err("Failed to verify password")?;
        if !verified {
            return Err(invalid());
        }

        signed_in(
            &self.app,
            AuthClaims::new(user.username, user.is_admin, user.team_id),
        )
    }
}

#[async_trait]
impl MethodHandler for LoginHandler {
    async fn handle(&self, request: Request, _ctx: RequestContext) -> Response {
        self.login(request).await.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert_eq!(validate_username("bob2121"), None);
        assert!(validate_username("").is_some());
        assert!(validate_username("bob").is_some());
        assert!(validate_username("bobobobobobobobob").is_some());
        assert!(validate_username("bob_2121").is_some());
        assert!(validate_username("2121bob").is_some());
    }

    #[test]
    fn test_password_rules() {
        assert_eq!(validate_password("Myp4ssword!"), None);
        assert!(validate_password("Sh0rt!").is_some());
        assert!(validate_password("myNOdigitPASSWORD!").is_some());
        assert!(validate_password("nouppercase1!").is_some());
        assert!(validate_password("NOLOWERCASE1!").is_some());
        assert!(validate_password("NoSymbol123").is_some());
        assert!(validate_password("Has Space1!").is_some());
    }

    #[test]
    fn test_validation_reports_every_field() {
        let err = validate_credentials(&Credentials {
            username: "bobobobobobobobob".into(),
            password: "myNOdigitPASSWORD!".into(),
        })
        .unwrap_err();

        match err {
            ApiError::Validation(errors) => {
                assert_eq!(
                    errors["username"],
                    "Username cannot be longer than 15 characters."
                );
                assert_eq!(errors["password"], "Password must contain a digit (0-9).");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
