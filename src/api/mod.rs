mod boards;
mod error;
mod subtasks;
mod tasks;
mod team;
mod users;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Query, Request},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{AUTH_COOKIE_NAME, STATE_COOKIE_NAME, token_cookie};
use crate::db::Database;
use crate::dispatch::{ApiHandler, HttpMethod, MethodHandler, RequestContext};
use crate::rate_limit::RateLimitConfig;
use crate::token::{
    AUTH_TOKEN_DURATION_SECS, AuthClaims, BoardState, STATE_TOKEN_DURATION_SECS, StateClaims,
    TokenCodec, Verified,
};

pub use error::{ApiError, ResultExt, ValidationErrors};

/// Largest JSON body any endpoint accepts.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: Arc<TokenCodec>,
    pub secure_cookies: bool,
}

impl AppState {
    /// Route builder that authenticates every method.
    fn authenticated(&self) -> ApiHandler {
        ApiHandler::authenticated(self.tokens.clone())
    }

    /// Route builder that authenticates and decodes the state cookie.
    fn authenticated_with_state(&self) -> ApiHandler {
        self.authenticated().with_state(self.tokens.clone())
    }

    /// Sign an auth token and build its cookie. Returns (token, cookie).
    fn issue_auth(&self, claims: &AuthClaims) -> Result<(String, HeaderValue), ApiError> {
        let expires_at = Utc::now() + Duration::seconds(AUTH_TOKEN_DURATION_SECS);
        let token = self
            .tokens
            .encode_auth(expires_at, claims)
            .internal_err("Failed to create auth token")?;
        let cookie = token_cookie(AUTH_COOKIE_NAME, &token, expires_at, self.secure_cookies);
        let cookie = HeaderValue::from_str(&cookie).internal_err("Failed to create auth cookie")?;
        Ok((token, cookie))
    }

    /// Sign the state for the caller's team and build its cookie.
    fn state_cookie(&self, auth: &AuthClaims, state: StateClaims) -> Result<HeaderValue, ApiError> {
        let state = state.for_team(auth.team_id.as_str());
        let expires_at = Utc::now() + Duration::seconds(STATE_TOKEN_DURATION_SECS);
        let token = self
            .tokens
            .encode_state(expires_at, &state)
            .internal_err("Failed to create state token")?;
        let cookie = token_cookie(STATE_COOKIE_NAME, &token, expires_at, self.secure_cookies);
        HeaderValue::from_str(&cookie).internal_err("Failed to create state cookie")
    }

    /// Rebuild the state of a team from the database, keeping `active_board`
    /// if it still belongs to the team.
    async fn team_state(
        &self,
        team_id: &str,
        active_board: Option<String>,
    ) -> Result<StateClaims, ApiError> {
        let boards = self
            .db
            .boards()
            .list_by_team(team_id)
            .await
            .db_err("Failed to list boards")?;
        let task_ids = self
            .db
            .tasks()
            .ids_by_team(team_id)
            .await
            .db_err("Failed to list tasks")?;

        let boards: Vec<BoardState> = boards
            .into_iter()
            .map(|board| BoardState {
                tasks: task_ids
                    .iter()
                    .filter(|(board_id, _)| *board_id == board.id)
                    .map(|(_, task_id)| task_id.clone())
                    .collect(),
                id: board.id,
            })
            .collect();
        let active_board = active_board.filter(|id| boards.iter().any(|b| &b.id == id));

        Ok(StateClaims::new(team_id, active_board, boards))
    }
}

/// JSON response carrying a `Set-Cookie` header.
fn with_cookie(cookie: HeaderValue, body: impl Serialize) -> Response {
    ([(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

/// Claims of the authenticated caller. Only valid on authenticated routes.
fn caller(ctx: &RequestContext) -> Result<&Verified<AuthClaims>, ApiError> {
    ctx.auth
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Route is not authenticated".into()))
}

/// Require the caller to be a team admin.
fn require_admin(auth: &AuthClaims) -> Result<(), ApiError> {
    if auth.is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only team admins can do this."))
    }
}

/// Read and deserialize a JSON request body.
async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::bad_request("Request body is too large or unreadable."))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))
}

/// Deserialize the query string.
fn read_query<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    Query::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

struct HealthHandler;

#[async_trait]
impl MethodHandler for HealthHandler {
    async fn handle(&self, _request: Request, _ctx: RequestContext) -> Response {
        Json(serde_json::json!({ "status": "ok" })).into_response()
    }
}

/// Create the API router.
pub fn create_api_router(
    app: AppState,
    auth_rate_limit: u32,
    ip_header: Option<HeaderName>,
) -> Router {
    let rate_limit = RateLimitConfig::new(auth_rate_limit, ip_header);

    Router::new()
        .route(
            "/health",
            ApiHandler::new()
                .on(HttpMethod::Get, HealthHandler)
                .into_route(),
        )
        .merge(users::router(app.clone(), rate_limit))
        .merge(team::router(app.clone()))
        .merge(boards::router(app.clone()))
        .merge(tasks::router(app.clone()))
        .merge(subtasks::router(app))
}
