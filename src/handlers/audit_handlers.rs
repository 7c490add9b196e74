use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::audit::{self, AuditEntry};
use crate::auth::session::require_permission;
use crate::auth::validate;
use crate::errors::{AppError, render};
use crate::models::table::{self, Column};
use crate::templates_structs::{AuditListTemplate, PageContext, PageMeta};

const PER_PAGE: i64 = 50;

#[derive(Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub action: Option<String>,
    pub page: Option<i64>,
}

fn audit_columns() -> Vec<Column<AuditEntry>> {
    vec![
        Column::text("when", "When", |e: &AuditEntry| e.created_at.clone()),
        Column::text("who", "Who", |e: &AuditEntry| e.user_name.clone()),
        Column::text("action", "Action", |e: &AuditEntry| e.action.clone()),
        Column::text("target", "Target", |e: &AuditEntry| {
            format!("{} #{}", e.target_type, e.target_id)
        }),
        Column::text("summary", "Summary", |e: &AuditEntry| e.summary.clone()),
    ]
}

/// GET /audit
pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "audit.list")?;

    let search = validate::search_query(query.q.as_deref());
    let action_filter = query
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from);
    let page = query.page.unwrap_or(1);

    let audit_page = audit::find_paginated(
        &pool,
        page,
        PER_PAGE,
        action_filter.as_deref(),
        search.as_deref(),
    )
    .await?;

    // Audit rows are read-only; no action column
    let table = table::build(&audit_page.entries, &audit_columns(), &[], |_, _| None);

    let mut base_url = String::from("/audit?");
    if let Some(q) = &search {
        base_url.push_str(&format!("q={q}&"));
    }
    if let Some(a) = &action_filter {
        base_url.push_str(&format!("action={a}&"));
    }
    let pager = PageMeta::new(
        audit_page.page,
        audit_page.total_count,
        audit_page.total_pages,
        base_url,
    );

    let actions = audit::distinct_actions(&pool).await.unwrap_or_default();

    let ctx = PageContext::build(&session, &pool, "/audit").await?;
    let tmpl = AuditListTemplate {
        ctx,
        table,
        pager,
        actions,
        action_filter: action_filter.unwrap_or_default(),
        search_query: search.unwrap_or_default(),
    };
    render(tmpl)
}
