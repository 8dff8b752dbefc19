use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::Request,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use serde::Serialize;

use super::{ApiError, AppState, ResultExt, caller, require_admin, with_cookie};
use crate::dispatch::{HttpMethod, MethodHandler, RequestContext};
use crate::token::{INVITE_TOKEN_DURATION_SECS, InviteClaims};

pub fn router(app: AppState) -> Router {
    Router::new()
        .route(
            "/team",
            app.authenticated_with_state()
                .on(HttpMethod::Get, GetHandler { app: app.clone() })
                .into_route(),
        )
        .route(
            "/team/invite",
            app.authenticated()
                .on(HttpMethod::Get, InviteHandler { app: app.clone() })
                .into_route(),
        )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberResponse {
    username: String,
    is_admin: bool,
}

#[derive(Serialize)]
struct BoardSummary {
    id: String,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamResponse {
    id: String,
    members: Vec<MemberResponse>,
    boards: Vec<BoardSummary>,
    active_board: Option<String>,
}

/// Team overview. Also re-issues the state cookie from the database, which
/// is how a client obtains state after login.
struct GetHandler {
    app: AppState,
}

impl GetHandler {
    async fn get(&self, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let db = &self.app.db;

        let members = db
            .users()
            .list_by_team(&auth.team_id)
            .await
            .db_err("Failed to list team members")?;
        let boards = db
            .boards()
            .list_by_team(&auth.team_id)
            .await
            .db_err("Failed to list boards")?;

        let state = self
            .app
            .team_state(&auth.team_id, ctx.state.active_board.clone())
            .await?;
        let cookie = self.app.state_cookie(auth, state.clone())?;

        Ok(with_cookie(
            cookie,
            TeamResponse {
                id: auth.team_id.clone(),
                members: members
                    .into_iter()
                    .map(|u| MemberResponse {
                        username: u.username,
                        is_admin: u.is_admin,
                    })
                    .collect(),
                boards: boards
                    .into_iter()
                    .map(|b| BoardSummary {
                        id: b.id,
                        name: b.name,
                    })
                    .collect(),
                active_board: state.active_board,
            },
        ))
    }
}

#[async_trait]
impl MethodHandler for GetHandler {
    async fn handle(&self, _request: Request, ctx: RequestContext) -> Response {
        self.get(ctx).await.into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InviteResponse {
    invite_token: String,
}

struct InviteHandler {
    app: AppState,
}

impl InviteHandler {
    fn invite(&self, ctx: &RequestContext) -> Result<Response, ApiError> {
        let auth = caller(ctx)?;
        require_admin(auth)?;

        let expires_at = Utc::now() + Duration::seconds(INVITE_TOKEN_DURATION_SECS);
        let invite_token = self
            .app
            .tokens
            .encode_invite(
                expires_at,
                &InviteClaims {
                    team_id: auth.team_id.clone(),
                },
            )
            .internal_err("Failed to create invite token")?;

        Ok(Json(InviteResponse { invite_token }).into_response())
    }
}

#[async_trait]
impl MethodHandler for InviteHandler {
    async fn handle(&self, _request: Request, ctx: RequestContext) -> Response {
        self.invite(&ctx).into_response()
    }
}
