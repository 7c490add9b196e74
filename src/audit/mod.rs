use serde_json::Value;
use sqlx::PgPool;

/// Audit entries older than this are pruned at startup.
const RETENTION_DAYS: i32 = 180;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub summary: String,
    pub created_at: String,
}

pub struct AuditEntryPage {
    pub entries: Vec<AuditEntry>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Record a mutation. Callers ignore the result — a failed audit write must
/// never fail the mutation it describes.
pub async fn log(
    pool: &PgPool,
    user_id: i64,
    action: &str,
    target_type: &str,
    target_id: i64,
    details: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_log (user_id, action, target_type, target_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}

const SELECT_ENTRY: &str = "\
    SELECT a.id, a.user_id, \
           COALESCE(u.first_name || ' ' || u.last_name, 'system') AS user_name, \
           a.action, a.target_type, a.target_id, \
           COALESCE(a.details->>'summary', '') AS summary, \
           to_char(a.created_at, 'YYYY-MM-DD HH24:MI') AS created_at \
    FROM audit_log a \
    LEFT JOIN users u ON u.id = a.user_id";

pub async fn find_recent(pool: &PgPool, limit: i64) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditEntry>(&format!(
        "{SELECT_ENTRY} ORDER BY a.created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Paginated audit list with optional action and free-text filters.
pub async fn find_paginated(
    pool: &PgPool,
    page: i64,
    per_page: i64,
    action: Option<&str>,
    search: Option<&str>,
) -> Result<AuditEntryPage, sqlx::Error> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let action_filter = action.unwrap_or("");
    let pattern = match search {
        Some(q) => format!("%{}%", q.trim()),
        None => "%".to_string(),
    };

    let where_clause = "\
        WHERE ($1 = '' OR a.action = $1) \
          AND (COALESCE(u.first_name || ' ' || u.last_name, 'system') ILIKE $2 \
               OR a.details->>'summary' ILIKE $2)";

    let total_count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM audit_log a LEFT JOIN users u ON u.id = a.user_id {where_clause}"
    ))
    .bind(action_filter)
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let entries = sqlx::query_as::<_, AuditEntry>(&format!(
        "{SELECT_ENTRY} {where_clause} ORDER BY a.created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(action_filter)
    .bind(&pattern)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_pages = ((total_count as f64) / (per_page as f64)).ceil() as i64;

    Ok(AuditEntryPage { entries, page, per_page, total_count, total_pages })
}

/// Distinct action names, for the filter dropdown.
pub async fn distinct_actions(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT action FROM audit_log ORDER BY action")
        .fetch_all(pool)
        .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_log").fetch_one(pool).await
}

/// Prune entries past the retention window. Called once at startup.
pub async fn cleanup_old_entries(pool: &PgPool) {
    let result = sqlx::query(
        "DELETE FROM audit_log WHERE created_at < now() - make_interval(days => $1)",
    )
    .bind(RETENTION_DAYS)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            if done.rows_affected() > 0 {
                log::info!("Audit cleanup removed {} old entries", done.rows_affected());
            }
        }
        Err(e) => log::warn!("Audit cleanup failed: {e}"),
    }
}
