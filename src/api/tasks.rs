//! Tasks on a board: `/tasks` works on a whole board, `/task` on a single task.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::Request,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::subtasks::{SubtaskResponse, validate_subtasks};
use super::{ApiError, AppState, ResultExt, caller, read_json, read_query, with_cookie};
use crate::db::{NewTask, Task, TaskMove};
use crate::dispatch::{HttpMethod, MethodHandler, RequestContext};
use crate::token::StateClaims;

/// Columns are numbered 0 (ready) to 3 (done).
const MAX_COLUMN: i64 = 3;
const MAX_TITLE_LEN: usize = 50;

pub fn router(app: AppState) -> Router {
    Router::new()
        .route(
            "/tasks",
            app.authenticated_with_state()
                .on(HttpMethod::Get, ListHandler { app: app.clone() })
                .on(HttpMethod::Patch, MoveHandler { app: app.clone() })
                .into_route(),
        )
        .route(
            "/task",
            app.authenticated_with_state()
                .on(HttpMethod::Post, PostHandler { app: app.clone() })
                .on(HttpMethod::Patch, PatchHandler { app: app.clone() })
                .on(HttpMethod::Delete, DeleteHandler { app: app.clone() })
                .into_route(),
        )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    id: String,
    board_id: String,
    column: i64,
    order: i64,
    title: String,
    description: String,
    subtasks: Vec<SubtaskResponse>,
}

impl TaskResponse {
    fn new(task: Task, subtasks: Vec<SubtaskResponse>) -> Self {
        Self {
            id: task.id,
            board_id: task.board_id,
            column: task.column_no,
            order: task.position,
            title: task.title,
            description: task.description,
            subtasks,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardQuery {
    #[serde(default)]
    board_id: String,
}

#[derive(Deserialize)]
struct IdQuery {
    #[serde(default)]
    id: String,
}

fn validate_column(column: i64) -> Result<(), ApiError> {
    if (0..=MAX_COLUMN).contains(&column) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Column must be between 0 and 3."))
    }
}

fn validate_title(title: &str) -> Result<&str, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Task title cannot be empty."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::bad_request(
            "Task title cannot be longer than 50 characters.",
        ));
    }
    Ok(title)
}

fn require_board(state: &StateClaims, board_id: &str) -> Result<(), ApiError> {
    if board_id.is_empty() {
        return Err(ApiError::bad_request("Board ID cannot be empty."));
    }
    if !state.has_board(board_id) {
        return Err(ApiError::forbidden("You do not have access to this board."));
    }
    Ok(())
}

/// Read `?id=` and check the task is one the caller's state knows about.
fn task_id_in_state(request: &Request, state: &StateClaims) -> Result<String, ApiError> {
    let IdQuery { id } = read_query(request)?;
    if id.is_empty() {
        return Err(ApiError::bad_request("Task ID cannot be empty."));
    }
    if state.board_of_task(&id).is_none() {
        return Err(ApiError::forbidden("You do not have access to this task."));
    }
    Ok(id)
}

/// A task of the team with its subtasks.
async fn load_task(app: &AppState, id: &str, team_id: &str) -> Result<TaskResponse, ApiError> {
    let task = app
        .db
        .tasks()
        .get(id, team_id)
        .await
        .db_err("Failed to load task")?
        .ok_or_else(|| ApiError::not_found("Task not found."))?;
    let subtasks = app
        .db
        .subtasks()
        .list_by_task(id, team_id)
        .await
        .db_err("Failed to list subtasks")?;

    Ok(TaskResponse::new(
        task,
        subtasks.into_iter().map(SubtaskResponse::from).collect(),
    ))
}

/// `GET /tasks?boardId=`: list a board and make it the active one.
struct ListHandler {
    app: AppState,
}

impl ListHandler {
    async fn list(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let BoardQuery { board_id } = read_query(&request)?;
        require_board(&ctx.state, &board_id)?;

        let db = &self.app.db;
        let tasks = db
            .tasks()
            .list_by_board(&board_id, &auth.team_id)
            .await
            .db_err("Failed to list tasks")?;
        let mut subtasks: HashMap<String, Vec<SubtaskResponse>> = HashMap::new();
        for subtask in db
            .subtasks()
            .list_by_board(&board_id, &auth.team_id)
            .await
            .db_err("Failed to list subtasks")?
        {
            subtasks
                .entry(subtask.task_id.clone())
                .or_default()
                .push(subtask.into());
        }

        // Teammates may have added tasks since the state was issued.
        let task_ids = tasks.iter().map(|t| t.id.clone()).collect();
        let state = ctx
            .state
            .clone()
            .with_board_tasks(&board_id, task_ids)
            .with_active_board(board_id);
        let cookie = self.app.state_cookie(auth, state)?;

        let tasks: Vec<TaskResponse> = tasks
            .into_iter()
            .map(|task| {
                let task_subtasks = subtasks.remove(&task.id).unwrap_or_default();
                TaskResponse::new(task, task_subtasks)
            })
            .collect();
        Ok(with_cookie(cookie, tasks))
    }
}

#[async_trait]
impl MethodHandler for ListHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.list(request, ctx).await.into_response()
    }
}

#[derive(Deserialize)]
struct MoveRequest {
    id: String,
    column: i64,
    order: i64,
}

#[derive(Serialize)]
struct MoveResponse {
    moved: usize,
}

/// `PATCH /tasks?boardId=`: move many tasks within a board at once.
struct MoveHandler {
    app: AppState,
}

impl MoveHandler {
    async fn move_tasks(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let BoardQuery { board_id } = read_query(&request)?;
        require_board(&ctx.state, &board_id)?;

        let moves: Vec<MoveRequest> = read_json(request).await?;
        let mut batch = Vec::with_capacity(moves.len());
        for m in moves {
            validate_column(m.column)?;
            if m.order < 0 {
                return Err(ApiError::bad_request("Order cannot be negative."));
            }
            if ctx.state.board_of_task(&m.id) != Some(board_id.as_str()) {
                return Err(ApiError::forbidden("You do not have access to this task."));
            }
            batch.push(TaskMove {
                id: m.id,
                column_no: m.column,
                position: m.order,
            });
        }

        let moved = self
            .app
            .db
            .tasks()
            .move_many(&board_id, &auth.team_id, &batch)
            .await
            .db_err("Failed to move tasks")?;

        Ok(Json(MoveResponse { moved }).into_response())
    }
}

#[async_trait]
impl MethodHandler for MoveHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.move_tasks(request, ctx).await.into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    #[serde(default)]
    board_id: String,
    #[serde(default)]
    column: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    subtasks: Vec<String>,
}

struct PostHandler {
    app: AppState,
}

impl PostHandler {
    async fn create(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let body: CreateRequest = read_json(request).await?;
        require_board(&ctx.state, &body.board_id)?;
        validate_column(body.column)?;
        let title = validate_title(&body.title)?;
        let subtask_titles = validate_subtasks(&body.subtasks)?;

        let id = uuid::Uuid::new_v4().to_string();
        let db = &self.app.db;
        let new_task = NewTask::new(&id, &body.board_id, body.column, title)
            .description(&body.description)
            .subtasks(&subtask_titles);
        let created = db
            .tasks()
            .create(&auth.team_id, &new_task)
            .await
            .db_err("Failed to create task")?;
        if !created {
            return Err(ApiError::not_found("Board not found."));
        }
        info!(
            task_id = %id,
            board_id = %body.board_id,
            user = %ctx.subject(),
            "Task created"
        );

        let response = load_task(&self.app, &id, &auth.team_id).await?;
        let state = ctx.state.clone().with_task(&body.board_id, id);
        let cookie = self.app.state_cookie(auth, state)?;
        let mut response = with_cookie(cookie, response);
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

#[derive(Deserialize)]
struct EditRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

struct PatchHandler {
    app: AppState,
}

impl PatchHandler {
    async fn edit(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let id = task_id_in_state(&request, &ctx.state)?;
        let body: EditRequest = read_json(request).await?;
        let title = validate_title(&body.title)?;

        let updated = self
            .app
            .db
            .tasks()
            .update(&id, &auth.team_id, title, &body.description)
            .await
            .db_err("Failed to update task")?;
        if !updated {
            return Err(ApiError::not_found("Task not found."));
        }

        Ok(Json(load_task(&self.app, &id, &auth.team_id).await?).into_response())
    }
}

#[async_trait]
impl MethodHandler for PatchHandler {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response {
        self.edit(request, ctx).await.into_response()
    }
}

struct DeleteHandler {
    app: AppState,
}

impl DeleteHandler {
    async fn delete(&self, request: Request, ctx: RequestContext) -> Result<Response, ApiError> {
        let auth = caller(&ctx)?;
        let id = task_id_in_state(&request, &ctx.state)?;

        let deleted = self
            .app
            .db
            .tasks()
            .delete(&id, &auth.team_id)
            .await
            .db_err("Failed to delete task")?;
        if !deleted {
            return Err(ApiError::not_found("Task not found."));
        }

        info!(task_id = %id, user = %ctx.subject(), "Task deleted");

        let state = ctx.state.clone().without_task(&id);
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
