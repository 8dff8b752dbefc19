//! Task storage. Tasks live in one of the kanban columns of a board.

use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub column_no: i64,
    pub position: i64,
    pub title: String,
    pub description: String,
}

/// A new column/position for one task.
#[derive(Debug, Clone)]
pub struct TaskMove {
    pub id: String,
    pub column_no: i64,
    pub position: i64,
}

/// A task to insert, with its subtask titles in order.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub id: &'a str,
    pub board_id: &'a str,
    pub column_no: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub subtasks: &'a [String],
}

impl<'a> NewTask<'a> {
    pub fn new(id: &'a str, board_id: &'a str, column_no: i64, title: &'a str) -> Self {
        Self {
            id,
            board_id,
            column_no,
            title,
            description: "",
            subtasks: &[],
        }
    }

    pub fn description(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }

    pub fn subtasks(mut self, subtasks: &'a [String]) -> Self {
        self.subtasks = subtasks;
        self
    }
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a task at the bottom of its column, together with its subtasks.
    /// Returns false, writing nothing, if the board does not belong to the team.
    pub async fn create(&self, team_id: &str, task: &NewTask<'_>) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO tasks (id, board_id, column_no, position, title, description)
             SELECT ?, b.id, ?,
                    (SELECT COUNT(*) FROM tasks WHERE board_id = b.id AND column_no = ?),
                    ?, ?
             FROM boards b WHERE b.id = ? AND b.team_id = ?",
        )
        .bind(task.id)
        .bind(task.column_no)
        .bind(task.column_no)
        .bind(task.title)
        .bind(task.description)
        .bind(task.board_id)
        .bind(team_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for (position, title) in task.subtasks.iter().enumerate() {
            sqlx::query("INSERT INTO subtasks (id, task_id, position, title) VALUES (?, ?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(task.id)
                .bind(position as i64)
                .bind(title)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Get a task if its board belongs to the given team.
    pub async fn get(&self, id: &str, team_id: &str) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as(
            "SELECT t.id, t.board_id, t.column_no, t.position, t.title, t.description
             FROM tasks t JOIN boards b ON b.id = t.board_id
             WHERE t.id = ? AND b.team_id = ?",
        )
        .bind(id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List a board's tasks by column, then position.
    pub async fn list_by_board(
        &self,
        board_id: &str,
        team_id: &str,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as(
            "SELECT t.id, t.board_id, t.column_no, t.position, t.title, t.description
             FROM tasks t JOIN boards b ON b.id = t.board_id
             WHERE t.board_id = ? AND b.team_id = ?
             ORDER BY t.column_no, t.position",
        )
        .bind(board_id)
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Every (board_id, task_id) pair of a team, boards oldest first.
    pub async fn ids_by_team(&self, team_id: &str) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT t.board_id, t.id FROM tasks t JOIN boards b ON b.id = t.board_id
             WHERE b.team_id = ?
             ORDER BY b.created_at, b.rowid, t.column_no, t.position",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Edit title and description. Returns true if the task was updated.
    pub async fn update(
        &self,
        id: &str,
        team_id: &str,
        title: &str,
        description: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET title = ?, description = ?
             WHERE id = ? AND board_id IN (SELECT id FROM boards WHERE team_id = ?)",
        )
        .bind(title)
        .bind(description)
        .bind(id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns true if the task was deleted.
    pub async fn delete(&self, id: &str, team_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM tasks WHERE id = ? AND board_id IN (SELECT id FROM boards WHERE team_id = ?)",
        )
        .bind(id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a batch of moves within one board atomically.
    /// Moves naming tasks of other boards are skipped, and nothing moves
    /// unless the board belongs to the team.
    /// Returns the number of tasks moved.
    pub async fn move_many(
        &self,
        board_id: &str,
        team_id: &str,
        moves: &[TaskMove],
    ) -> Result<usize, sqlx::Error> {
        if moves.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut moved = 0;

        for m in moves {
            let result = sqlx::query(
                "UPDATE tasks SET column_no = ?, position = ?
                 WHERE id = ? AND board_id = (SELECT id FROM boards WHERE id = ? AND team_id = ?)",
            )
            .bind(m.column_no)
            .bind(m.position)
            .bind(&m.id)
            .bind(board_id)
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
            moved += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(moved)
    }
}
