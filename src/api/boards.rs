//! Board management for team admins. Boards are addressed by ids the caller
//! received in its state token.

use async_trait::async_trait;
use axum::{
    Router,
    extract::Request,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    ApiError, AppState, ResultExt, caller, read_json, read_query, require_admin, with_cookie,
};
use crate::dispatch::{HttpMethod, MethodHandler, RequestContext};
use crate::token::StateClaims;

const MAX_BOARDS_PER_TEAM: i64 = 3;
const MAX_NAME_LEN: usize = 35;

pub fn router(app: AppState) -> Router {
    Router::new().route(
        "/team/board",
        app.authenticated_with_state()
            .on(HttpMethod::Post, PostHandler { app: app.clone() })
            .on(HttpMethod::Patch, PatchHandler { app: app.clone() })
            .on(HttpMethod::Delete, DeleteHandler { app: app.clone() })
            .into_route(),
    )
}

#[derive(Deserialize)]
struct BoardRequest {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct IdQuery {
    #[serde(default)]
    id: String,
}

#[derive(Serialize)]
struct BoardResponse {
    id: String,
    name: String,
}

fn validate_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Board name cannot be empty."));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(
            "Board name cannot be longer than 35 characters.",
        ));
    }
    Ok(name)
}

/// Read `?id=` and check the board is one the caller's state knows about.
fn board_id_in_state(request: &Request, state: &StateClaims) -> Result<String, ApiError> {
    let IdQuery { id } = read_query(request)?;
    if id.is_empty() {
        return Err(ApiError::bad_request("Board ID cannot be empty."));
    }
    if !state.has_board(&id) {
        return Err(ApiError::forbidden("You do not have access to this board."));
    }
    Ok(id)
}

struct PostHandler {
    app: AppState,
}

impl PostHandler {
    async fn create(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        require_admin(auth)?;

        let body: BoardRequest = read_json(request).await?;
        let name = validate_name(&body.name)?;

        let boards = self.app.db.boards();
        let count = boards
            .count_by_team(&auth.team_id)
            .await
            .db_err("Failed to count boards")?;
        if count >= MAX_BOARDS_PER_TEAM {
            return Err(ApiError::bad_request(
                "You have already created the maximum amount of boards allowed per team. \
                 Please delete one of your boards to create a new one.",
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        boards
            .create(&id, &auth.team_id, name)
            .await
            .db_err("Failed to create board")?;
        info!(
            board_id = %id,
            team_id = %auth.team_id,
            user = %ctx.subject(),
            "Board created"
        );

        let state = ctx.state.clone().with_board(id.clone());
        let cookie = self.app.state_cookie(auth, state)?;
        let mut response = with_cookie(
            cookie,
            BoardResponse {
                id,
                name: name.to_string(),
            },
        );
        *response.status_mut() = StatusCode::CREATED;
        Ok(response)
    }
}

#[async_trait]
impl MethodHandler for PostHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.create(request, ctx).await.into_response()
    }
}

struct PatchHandler {
    app: AppState,
}

impl PatchHandler {
    async fn rename(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        require_admin(auth)?;

        let id = board_id_in_state(&request, &ctx.state)?;
        let body: BoardRequest = read_json(request).await?;
        let name = validate_name(&body.name)?;

        let renamed = self
            .app
            .db
            .boards()
            .rename(&id, &auth.team_id, name)
            .await
            .db_err("Failed to rename board")?;
        if !renamed {
            return Err(ApiError::not_found("Board not found."));
        }

        let cookie = self.app.state_cookie(auth, ctx.state.clone())?;
        Ok(with_cookie(
            cookie,
            BoardResponse {
                id,
                name: name.to_string(),
            },
        ))
    }
}

#[async_trait]
impl MethodHandler for PatchHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.rename(request, ctx).await.into_response()
    }
}

struct DeleteHandler {
    app: AppState,
}

impl DeleteHandler {
    async fn delete(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        require_admin(auth)?;

        let id = board_id_in_state(&request, &ctx.state)?;
        let deleted = self
            .app
            .db
            .boards()
            .delete(&id, &auth.team_id)
            .await
            .db_err("Failed to delete board")?;
        if !deleted {
            return Err(ApiError::not_found("Board not found."));
        }
        info!(
            board_id = %id,
            team_id = %auth.team_id,
            user = %ctx.subject(),
            "Board deleted"
        );

        let state = ctx.state.clone().without_board(&id);
        let cookie = self.app.state_cookie(auth, state)?;
        Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
    }
}

#[async_trait]
impl MethodHandler for DeleteHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.delete(request, ctx).await.into_response()
    }
}
