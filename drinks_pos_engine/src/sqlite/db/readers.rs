use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Reader, ReaderStatus},
    traits::ReaderManagementError,
};

pub async fn delete_all_readers(conn: &mut SqliteConnection) -> Result<u64, ReaderManagementError> {
    let result = sqlx::query("DELETE FROM readers").execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn upsert_reader(reader: &Reader, conn: &mut SqliteConnection) -> Result<Reader, ReaderManagementError> {
    let reader = sqlx::query_as(
        r#"
            INSERT INTO readers (id, name, status, device_identifier, device_model, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                device_identifier = excluded.device_identifier,
                device_model = excluded.device_model,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(&reader.id)
    .bind(&reader.name)
    .bind(reader.status)
    .bind(&reader.device_identifier)
    .bind(&reader.device_model)
    .bind(reader.created_at)
    .bind(reader.updated_at)
    .fetch_one(conn)
    .await?;
    Ok(reader)
}

pub async fn fetch_readers(conn: &mut SqliteConnection) -> Result<Vec<Reader>, ReaderManagementError> {
    let readers = sqlx::query_as("SELECT * FROM readers ORDER BY name").fetch_all(conn).await?;
    Ok(readers)
}

pub async fn fetch_reader(id: &str, conn: &mut SqliteConnection) -> Result<Option<Reader>, ReaderManagementError> {
    let reader = sqlx::query_as("SELECT * FROM readers WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(reader)
}

/// Reader names are not unique. The most recently updated reader with the given name wins.
pub async fn fetch_reader_by_name(
    name: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Reader>, ReaderManagementError> {
    let reader = sqlx::query_as("SELECT * FROM readers WHERE name = $1 ORDER BY updated_at DESC LIMIT 1")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(reader)
}

pub async fn delete_reader(id: &str, conn: &mut SqliteConnection) -> Result<bool, ReaderManagementError> {
    let result = sqlx::query("DELETE FROM readers WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_reader_status(
    id: &str,
    status: ReaderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Reader>, ReaderManagementError> {
    let reader = sqlx::query_as("UPDATE readers SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(reader)
}
