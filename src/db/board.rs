//! Board storage. Every query is scoped to the owning team.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct BoardStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Board {
    pub id: String,
    pub team_id: String,
    pub name: String,
}

impl BoardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, id: &str, team_id: &str, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO boards (id, team_id, name) VALUES (?, ?, ?)")
            .bind(id)
            .bind(team_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_by_team(&self, team_id: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM boards WHERE team_id = ?")
            .bind(team_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// List a team's boards, oldest first.
    pub async fn list_by_team(&self, team_id: &str) -> Result<Vec<Board>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, team_id, name FROM boards WHERE team_id = ? ORDER BY created_at, rowid",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn rename(&self, id: &str, team_id: &str, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE boards SET name = ? WHERE id = ? AND team_id = ?")
            .bind(name)
            .bind(id)
            .bind(team_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a board and, through the foreign key, its tasks.
    pub async fn delete(&self, id: &str, team_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = ? AND team_id = ?")
            .bind(id)
            .bind(team_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
