use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TeamStore {
    pool: SqlitePool,
}

impl TeamStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO teams (id) VALUES (?)")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM teams WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }
}
