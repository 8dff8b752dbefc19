//! `/subtask`: tick subtasks off. Access goes through the parent task.

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::Request,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState, ResultExt, caller, read_json, read_query};
use crate::db::Subtask;
use crate::dispatch::{HttpMethod, MethodHandler, RequestContext};

const MAX_SUBTASK_TITLE_LEN: usize = 50;

pub fn router(app: AppState) -> Router {
    Router::new().route(
        "/subtask",
        app.authenticated_with_state()
            .on(HttpMethod::Patch, PatchHandler { app: app.clone() })
            .into_route(),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubtaskResponse {
    id: String,
    task_id: String,
    order: i64,
    title: String,
    done: bool,
}

impl From<Subtask> for SubtaskResponse {
    fn from(subtask: Subtask) -> Self {
        Self {
            id: subtask.id,
            task_id: subtask.task_id,
            order: subtask.position,
            title: subtask.title,
            done: subtask.done,
        }
    }
}

/// Trim subtask titles, rejecting empty or overlong ones.
pub(super) fn validate_subtasks(titles: &[String]) -> Result<Vec<String>, ApiError> {
    titles
        .iter()
        .map(|title| {
            let title = title.trim();
            if title.is_empty() {
                Err(ApiError::bad_request("Subtask title cannot be empty."))
            } else if title.chars().count() > MAX_SUBTASK_TITLE_LEN {
                Err(ApiError::bad_request(
                    "Subtask titles cannot be longer than 50 characters.",
                ))
            } else {
                Ok(title.to_string())
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct IdQuery {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct DoneRequest {
    done: bool,
}

/// `PATCH /subtask?id=`: mark a subtask done or not done.
struct PatchHandler {
    app: AppState,
}

impl PatchHandler {
    async fn toggle(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let IdQuery { id } = read_query(&request)?;
        if id.is_empty() {
            return Err(ApiError::bad_request("Subtask ID cannot be empty."));
        }
        let body: DoneRequest = read_json(request).await?;

        let subtasks = self.app.db.subtasks();
        let subtask = subtasks
            .get(&id, &auth.team_id)
            .await
            .db_err("Failed to load subtask")?
            .ok_or_else(|| ApiError::not_found("Subtask not found."))?;
        if ctx.state.board_of_task(&subtask.task_id).is_none() {
            return Err(ApiError::forbidden("You do not have access to this task."));
        }

        let updated = subtasks
            .set_done(&id, &auth.team_id, body.done)
            .await
            .db_err("Failed to update subtask")?;
        if !updated {
            return Err(ApiError::not_found("Subtask not found."));
        }
        info!(
            subtask_id = %id,
            done = body.done,
            user = %ctx.subject(),
            "Subtask updated"
        );

        Ok(Json(SubtaskResponse::from(Subtask {
            done: body.done,
            ..subtask
        }))
        .into_response())
    }
}

#[async_trait]
impl MethodHandler for PatchHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.toggle(request, ctx).await.into_response()
    }
}
