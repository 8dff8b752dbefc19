//! Subtask storage. Subtasks are an ordered checklist under one task and
//! are created together with it (see `TaskStore::create`).

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct SubtaskStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subtask {
    pub id: String,
    pub task_id: String,
    pub position: i64,
    pub title: String,
    pub done: bool,
}

impl SubtaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a subtask if its task's board belongs to the given team.
    pub async fn get(&self, id: &str, team_id: &str) -> Result<Option<Subtask>, sqlx::Error> {
        sqlx::query_as(
            "SELECT s.id, s.task_id, s.position, s.title, s.done
             FROM subtasks s
             JOIN tasks t ON t.id = s.task_id
             JOIN boards b ON b.id = t.board_id
             WHERE s.id = ? AND b.team_id = ?",
        )
        .bind(id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Subtasks of one task, in order.
    pub async fn list_by_task(
        &self,
        task_id: &str,
        team_id: &str,
    ) -> Result<Vec<Subtask>, sqlx::Error> {
        sqlx::query_as(
            "SELECT s.id, s.task_id, s.position, s.title, s.done
             FROM subtasks s
             JOIN tasks t ON t.id = s.task_id
             JOIN boards b ON b.id = t.board_id
             WHERE s.task_id = ? AND b.team_id = ?
             ORDER BY s.position",
        )
        .bind(task_id)
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Subtasks of every task on a board, grouped by task and in order.
    pub async fn list_by_board(
        &self,
        board_id: &str,
        team_id: &str,
    ) -> Result<Vec<Subtask>, sqlx::Error> {
        sqlx::query_as(
            "SELECT s.id, s.task_id, s.position, s.title, s.done
             FROM subtasks s
             JOIN tasks t ON t.id = s.task_id
             JOIN boards b ON b.id = t.board_id
             WHERE t.board_id = ? AND b.team_id = ?
             ORDER BY s.task_id, s.position",
        )
        .bind(board_id)
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Returns true if the subtask was updated.
    pub async fn set_done(&self, id: &str, team_id: &str, done: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE subtasks SET done = ?
             WHERE id = ? AND task_id IN (
                 SELECT t.id FROM tasks t JOIN boards b ON b.id = t.board_id
                 WHERE b.team_id = ?
             )",
        )
        .bind(done)
        .bind(id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
