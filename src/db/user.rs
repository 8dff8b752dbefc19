use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub team_id: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    is_admin: i32,
    team_id: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            is_admin: row.is_admin != 0,
            team_id: row.team_id,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a member of an existing team. Returns the user ID.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
        team_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, is_admin, team_id) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_admin as i32)
        .bind(team_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create a new team and its admin atomically. Returns the user ID.
    pub async fn create_with_team(
        &self,
        username: &str,
        password_hash: &str,
        team_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO teams (id) VALUES (?)")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, is_admin, team_id) VALUES (?, ?, 1, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(team_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, is_admin, team_id FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// List the members of a team, oldest first.
    pub async fn list_by_team(&self, team_id: &str) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, is_admin, team_id FROM users WHERE team_id = ? ORDER BY id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
