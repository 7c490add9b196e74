use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::session::{get_permissions, get_user_id, set_flash};
use crate::auth::csrf;
use crate::errors::{AppError, render};
use crate::models::document::{self, DocKind, DocStatus, PendingDocument};
use crate::models::record;
use crate::models::table::{self, Column, RowAction};
use crate::templates_structs::{PageContext, ReviewQueueTemplate, ReviewTemplate};

#[derive(Deserialize)]
pub struct ReviewForm {
    pub decision: String,
    pub csrf_token: String,
}

fn kind_label(raw: &str) -> String {
    DocKind::parse(raw)
        .map(|k| k.label().to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn queue_columns() -> Vec<Column<PendingDocument>> {
    vec![
        Column::text("record", "Record", |p: &PendingDocument| p.record_code.clone()),
        Column::text("student", "Student", |p: &PendingDocument| p.student_name.clone()),
        Column::text("group", "Group", |p: &PendingDocument| kind_label(&p.kind)),
        Column::text("document", "Document", |p: &PendingDocument| {
            p.slot_label().to_string()
        }),
        Column::text("uploaded", "Uploaded", |p: &PendingDocument| p.uploaded_at.clone()),
    ]
}

/// GET /reviews
/// Pending documents within the reviewer's authority.
pub async fn queue(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let permissions = get_permissions(&session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
    let scope = document::review_scope(&permissions)
        .ok_or_else(|| AppError::PermissionDenied("documents.review".to_string()))?;

    let pending = document::find_pending(&pool, scope).await?;

    let table = table::build(&pending, &queue_columns(), &[RowAction::Review], |_, p| {
        Some(format!("/reviews/{}", p.id))
    });

    let ctx = PageContext::build(&session, &pool, "/reviews").await?;
    let tmpl = ReviewQueueTemplate { ctx, table };
    render(tmpl)
}

/// Load a pending document and check the caller may decide it.
async fn reviewable_document(
    pool: &PgPool,
    session: &Session,
    doc_id: i64,
) -> Result<(document::Document, &'static document::SlotSpec), AppError> {
    let doc = document::find_by_id(pool, doc_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let kind = DocKind::parse(&doc.kind).ok_or(AppError::NotFound)?;
    let spec = kind.slot(&doc.slot).ok_or(AppError::NotFound)?;

    let permissions = get_permissions(session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
    if !spec.can_review(&permissions) {
        return Err(AppError::PermissionDenied(spec.reviewer.permission().to_string()));
    }
    if doc.status.as_deref() != Some(DocStatus::Pending.as_str()) {
        return Err(AppError::NotFound);
    }

    Ok((doc, spec))
}

/// GET /reviews/{id}
pub async fn review_page(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let doc_id = path.into_inner();
    let (doc, spec) = reviewable_document(&pool, &session, doc_id).await?;

    let rec = record::find_display_by_id(&pool, doc.record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let ctx = PageContext::build(&session, &pool, "/reviews").await?;
    let tmpl = ReviewTemplate {
        ctx,
        slot_label: spec.label.to_string(),
        preview_url: format!("/files/{}", doc.id),
        form_action: format!("/reviews/{}", doc.id),
        document: doc,
        record: rec,
    };
    render(tmpl)
}

/// POST /reviews/{id}
/// Approve or reject a pending document.
pub async fn decide(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<ReviewForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let doc_id = path.into_inner();
    let (doc, spec) = reviewable_document(&pool, &session, doc_id).await?;

    let Some(status @ (DocStatus::Approved | DocStatus::Rejected)) =
        DocStatus::parse(form.decision.trim())
    else {
        set_flash(&session, "error", "Choose approve or reject");
        return Ok(HttpResponse::SeeOther()
            .insert_header(("Location", format!("/reviews/{doc_id}")))
            .finish());
    };

    let reviewer_id = get_user_id(&session).unwrap_or(0);
    document::set_status(&pool, doc_id, status, reviewer_id).await?;

    let details = serde_json::json!({
        "kind": &doc.kind,
        "slot": &doc.slot,
        "decision": status.as_str(),
        "summary": format!("{} '{}'", status.label(), spec.label)
    });
    let _ = crate::audit::log(&pool, reviewer_id, "document.reviewed", "document", doc_id, details)
        .await;

    set_flash(
        &session,
        "success",
        &format!("Document '{}' {}", spec.label, status.as_str()),
    );
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/reviews"))
        .finish())
}
