use serde::Deserialize;
use sqlx::PgPool;

/// An academic record joined with its owning student, for lists and detail
/// pages.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordDisplay {
    pub id: i64,
    pub code: String,
    pub user_id: i64,
    pub student_name: String,
    pub student_email: String,
    pub identification: String,
    pub semester: Option<i16>,
    pub career: Option<String>,
    pub created_at: String,
}

impl RecordDisplay {
    pub fn semester_display(&self) -> String {
        self.semester.map(|s| s.to_string()).unwrap_or_default()
    }

    pub fn career_display(&self) -> String {
        self.career.clone().unwrap_or_default()
    }
}

pub struct RecordPage {
    pub records: Vec<RecordDisplay>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordForm {
    pub code: String,
    #[serde(default)]
    pub user_id: String,
    pub csrf_token: String,
}

const SELECT_RECORD: &str = "\
    SELECT r.id, r.code, r.user_id, \
           u.first_name || ' ' || u.last_name AS student_name, \
           u.email AS student_email, u.identification, u.semester, u.career, \
           to_char(r.created_at, 'YYYY-MM-DD HH24:MI') AS created_at \
    FROM records r \
    JOIN users u ON u.id = r.user_id";

const WHERE_SEARCH: &str = "\
    WHERE (r.code ILIKE $1 \
           OR u.first_name || ' ' || u.last_name ILIKE $1 \
           OR u.identification ILIKE $1)";

fn like_pattern(search: Option<&str>) -> String {
    match search {
        Some(q) => format!("%{}%", q.trim()),
        None => "%".to_string(),
    }
}

pub async fn find_paginated(
    pool: &PgPool,
    page: i64,
    per_page: i64,
    search: Option<&str>,
) -> Result<RecordPage, sqlx::Error> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;
    let pattern = like_pattern(search);

    let total_count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM records r JOIN users u ON u.id = r.user_id {WHERE_SEARCH}"
    ))
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let records = sqlx::query_as::<_, RecordDisplay>(&format!(
        "{SELECT_RECORD} {WHERE_SEARCH} ORDER BY r.code LIMIT $2 OFFSET $3"
    ))
    .bind(&pattern)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_pages = ((total_count as f64) / (per_page as f64)).ceil() as i64;

    Ok(RecordPage { records, page, per_page, total_count, total_pages })
}

pub async fn find_display_by_id(pool: &PgPool, id: i64) -> Result<Option<RecordDisplay>, sqlx::Error> {
    sqlx::query_as::<_, RecordDisplay>(&format!("{SELECT_RECORD} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_user_id(pool: &PgPool, user_id: i64) -> Result<Option<RecordDisplay>, sqlx::Error> {
    sqlx::query_as::<_, RecordDisplay>(&format!("{SELECT_RECORD} WHERE r.user_id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, code: &str, user_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("INSERT INTO records (code, user_id) VALUES ($1, $2) RETURNING id")
        .bind(code)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn update_code(pool: &PgPool, id: i64, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE records SET code = $1, updated_at = now() WHERE id = $2")
        .bind(code)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a record (cascades to its documents and permission documents).
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM records WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM records").fetch_one(pool).await
}
