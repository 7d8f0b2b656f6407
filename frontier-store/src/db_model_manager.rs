use sqlx::{Sqlite, SqlitePool, Transaction};

#[derive(Clone, Debug)]
pub struct DbModelManager {
    pool: SqlitePool,
}

impl DbModelManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin the ambient transaction a service call runs inside. BMC
    /// functions take `&mut SqliteConnection`, so `&mut *tx` feeds them.
    pub async fn begin(&self) -> sqlx::Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await
    }
}
