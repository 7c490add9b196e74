use serde::Deserialize;
use sqlx::PgPool;

/// A permission document: a supporting file plus free-text description,
/// attached to an academic record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PermissionDocument {
    pub id: i64,
    pub record_id: i64,
    pub file_path: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionDocForm {
    pub description: String,
    pub csrf_token: String,
}

const SELECT_PERMISSION_DOC: &str = "\
    SELECT p.id, p.record_id, p.file_path, p.description, \
           to_char(p.created_at, 'YYYY-MM-DD HH24:MI') AS created_at, \
           to_char(p.updated_at, 'YYYY-MM-DD HH24:MI') AS updated_at \
    FROM permission_documents p";

pub async fn find_by_record(pool: &PgPool, record_id: i64) -> Result<Vec<PermissionDocument>, sqlx::Error> {
    sqlx::query_as::<_, PermissionDocument>(&format!(
        "{SELECT_PERMISSION_DOC} WHERE p.record_id = $1 ORDER BY p.created_at DESC"
    ))
    .bind(record_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<PermissionDocument>, sqlx::Error> {
    sqlx::query_as::<_, PermissionDocument>(&format!("{SELECT_PERMISSION_DOC} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    record_id: i64,
    file_path: &str,
    description: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO permission_documents (record_id, file_path, description) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(record_id)
    .bind(file_path)
    .bind(description)
    .fetch_one(pool)
    .await
}

/// Update the description, and the file when a replacement was uploaded.
pub async fn update(
    pool: &PgPool,
    id: i64,
    description: &str,
    file_path: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE permission_documents \
         SET description = $1, file_path = COALESCE($2, file_path), updated_at = now() \
         WHERE id = $3",
    )
    .bind(description)
    .bind(file_path)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM permission_documents WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
