//! The simple record store behind the CRUD surface.
//!
//! A single `records` table with find/insert/update/delete/count; nothing
//! here is used by the workload engine, it exists to give operators a plain
//! query target while a run is in flight.

use mysql_async::prelude::*;
use mysql_async::Pool;
use serde::Serialize;

const TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS records (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

const SELECT_COLUMNS: &str = "SELECT id, name, CAST(created_at AS CHAR) FROM records";

#[derive(Clone, Debug, Serialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    pub created_at: String,
}

impl Record {
    fn from_tuple((id, name, created_at): (u64, String, String)) -> Self {
        Self {
            id,
            name,
            created_at,
        }
    }
}

#[derive(Clone)]
pub struct RecordStore {
    pool: Pool,
}

impl RecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Idempotently create the backing table.
    pub async fn ensure_table(&self) -> Result<(), mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(TABLE_DDL).await
    }

    pub async fn find_all(&self) -> Result<Vec<Record>, mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<(u64, String, String)> =
            conn.query(format!("{SELECT_COLUMNS} ORDER BY id")).await?;
        Ok(rows.into_iter().map(Record::from_tuple).collect())
    }

    pub async fn find(&self, id: u64) -> Result<Option<Record>, mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        let row: Option<(u64, String, String)> = conn
            .exec_first(format!("{SELECT_COLUMNS} WHERE id = ?"), (id,))
            .await?;
        Ok(row.map(Record::from_tuple))
    }

    pub async fn insert(&self, name: &str) -> Result<u64, mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop("INSERT INTO records (name) VALUES (?)", (name,))
            .await?;
        Ok(conn.last_insert_id().unwrap_or(0))
    }

    /// Returns `false` when no row had the given id.
    pub async fn update(&self, id: u64, name: &str) -> Result<bool, mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop("UPDATE records SET name = ? WHERE id = ?", (name, id))
            .await?;
        Ok(conn.affected_rows() > 0)
    }

    /// Returns `false` when no row had the given id.
    pub async fn delete(&self, id: u64) -> Result<bool, mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop("DELETE FROM records WHERE id = ?", (id,))
            .await?;
        Ok(conn.affected_rows() > 0)
    }

    pub async fn count(&self) -> Result<u64, mysql_async::Error> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<u64> = conn.query_first("SELECT COUNT(*) FROM records").await?;
        Ok(count.unwrap_or(0))
    }
}
