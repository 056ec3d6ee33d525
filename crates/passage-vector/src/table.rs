//! LanceDB connection and table helpers.
use anyhow::Result;
use lancedb::{connect, Connection};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> lancedb::Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Rows in `name`, or 0 when the table does not exist.
pub async fn row_count(conn: &Connection, name: &str) -> lancedb::Result<usize> {
    if !table_exists(conn, name).await? {
        return Ok(0);
    }
    conn.open_table(name).execute().await?.count_rows(None).await
}
