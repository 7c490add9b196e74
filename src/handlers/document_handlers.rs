use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::PgPool;

use crate::auth::session::{get_permissions, get_record_id, get_user_id, require_permission, set_flash};
use crate::auth::csrf;
use crate::errors::{AppError, render};
use crate::handlers::record_handlers::ensure_record_access;
use crate::models::document::{self, DocKind, DocStatus};
use crate::models::record;
use crate::templates_structs::{DocumentUploadTemplate, PageContext};
use crate::uploads::{self, UploadConfig};

fn parse_kind(raw: &str) -> Result<DocKind, AppError> {
    DocKind::parse(raw).ok_or(AppError::NotFound)
}

/// The record a student may upload into: their own, and nobody else's.
async fn own_record(
    pool: &PgPool,
    session: &Session,
    record_id: i64,
) -> Result<record::RecordDisplay, AppError> {
    require_permission(session, "documents.upload")?;
    if get_record_id(session) != Some(record_id) {
        return Err(AppError::PermissionDenied("documents.upload".to_string()));
    }
    record::find_display_by_id(pool, record_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// GET /records/{id}/documents/{kind}
/// Upload form for one document group: each slot with its current file and
/// review status.
pub async fn upload_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, String)>,
) -> Result<HttpResponse, AppError> {
    let (record_id, kind_raw) = path.into_inner();
    let kind = parse_kind(&kind_raw)?;
    let rec = own_record(&pool, &session, record_id).await?;

    let documents = document::find_by_record(&pool, rec.id).await?;
    let entries = document::slot_entries(kind, &documents);

    let ctx = PageContext::build(&session, &pool, "/record").await?;
    let tmpl = DocumentUploadTemplate {
        ctx,
        kind_label: kind.label().to_string(),
        form_action: format!("/records/{}/documents/{}", rec.id, kind.as_str()),
        record: rec,
        entries,
        errors: vec![],
    };
    render(tmpl)
}

/// POST /records/{id}/documents/{kind}
/// Multipart submission; any provided slot replaces the stored file and
/// resets its review status to pending. Submitting no file is rejected
/// without touching the database.
pub async fn upload(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    path: web::Path<(i64, String)>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let (record_id, kind_raw) = path.into_inner();
    let kind = parse_kind(&kind_raw)?;
    let rec = own_record(&pool, &session, record_id).await?;

    let slot_names: Vec<&str> = kind.slots().iter().map(|s| s.name).collect();
    let subdir = format!("{}/{}", rec.code, kind.as_str());

    let form = match uploads::collect(payload, &config, &subdir, &slot_names).await {
        Ok(form) => form,
        Err(AppError::Upload(msg)) => {
            return upload_form_with_errors(&pool, &session, kind, rec, vec![msg]).await;
        }
        Err(e) => return Err(e),
    };

    csrf::validate_csrf(&session, form.text("csrf_token").unwrap_or(""))?;

    if form.files.is_empty() {
        return upload_form_with_errors(
            &pool,
            &session,
            kind,
            rec,
            vec!["Select at least one file to upload".to_string()],
        )
        .await;
    }

    let existing = document::find_by_record(&pool, rec.id).await?;
    let uid = get_user_id(&session).unwrap_or(0);
    let mut replaced = 0usize;

    for saved in &form.files {
        let spec = kind.slot(&saved.field_name).ok_or(AppError::NotFound)?;

        // Drop the previous file of this slot when its stored name changed
        if let Some(old) = existing
            .iter()
            .find(|d| d.kind == kind.as_str() && d.slot == spec.name)
        {
            if old.file_path != saved.relative_path {
                uploads::remove_stored(&config, &old.file_path).await;
            }
            replaced += 1;
        }

        let doc_id =
            document::upsert_slot(&pool, rec.id, kind, spec, &saved.relative_path).await?;

        let details = serde_json::json!({
            "record": &rec.code,
            "kind": kind.as_str(),
            "slot": spec.name,
            "file": &saved.stored_name,
            "summary": format!("Uploaded '{}' for record '{}'", spec.label, rec.code)
        });
        let _ = crate::audit::log(&pool, uid, "document.uploaded", "document", doc_id, details).await;
    }

    let message = if replaced > 0 {
        format!(
            "{} document(s) uploaded ({} replaced); replaced documents await review again",
            form.files.len(),
            replaced
        )
    } else {
        format!("{} document(s) uploaded", form.files.len())
    };
    set_flash(&session, "success", &message);

    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/records/{}", rec.id)))
        .finish())
}

async fn upload_form_with_errors(
    pool: &PgPool,
    session: &Session,
    kind: DocKind,
    rec: record::RecordDisplay,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let documents = document::find_by_record(pool, rec.id).await?;
    let entries = document::slot_entries(kind, &documents);
    let ctx = PageContext::build(session, pool, "/record").await?;
    let tmpl = DocumentUploadTemplate {
        ctx,
        kind_label: kind.label().to_string(),
        form_action: format!("/records/{}/documents/{}", rec.id, kind.as_str()),
        record: rec,
        entries,
        errors,
    };
    render(tmpl)
}

/// POST /documents/{id}/delete
/// Students may remove their own not-yet-approved documents; admins any.
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    path: web::Path<i64>,
    form: web::Form<crate::handlers::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let doc_id = path.into_inner();
    let doc = document::find_by_id(&pool, doc_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let permissions = get_permissions(&session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
    let is_owner = get_record_id(&session) == Some(doc.record_id);
    let approved = doc.status.as_deref() == Some(DocStatus::Approved.as_str());

    let allowed = permissions.has("documents.delete")
        || (is_owner && permissions.has("documents.delete.own") && !approved);
    if !allowed {
        return Err(AppError::PermissionDenied("documents.delete".to_string()));
    }

    document::delete(&pool, doc_id).await?;
    uploads::remove_stored(&config, &doc.file_path).await;

    let uid = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "kind": &doc.kind,
        "slot": &doc.slot,
        "summary": format!("Deleted document '{}/{}'", doc.kind, doc.slot)
    });
    let _ = crate::audit::log(&pool, uid, "document.deleted", "document", doc_id, details).await;

    set_flash(&session, "success", "Document deleted");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/records/{}", doc.record_id)))
        .finish())
}

async fn serve_document(
    pool: &PgPool,
    session: &Session,
    config: &UploadConfig,
    req: &HttpRequest,
    doc_id: i64,
    as_attachment: bool,
) -> Result<HttpResponse, AppError> {
    let doc = document::find_by_id(pool, doc_id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_record_access(session, doc.record_id)?;

    let path = config.resolve(&doc.file_path);
    let file = actix_files::NamedFile::open_async(&path)
        .await
        .map_err(|_| AppError::NotFound)?;

    let file = if as_attachment {
        let filename = doc
            .file_path
            .rsplit('/')
            .next()
            .unwrap_or("document")
            .to_string();
        file.set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
    } else {
        file
    };

    Ok(file.into_response(req))
}

/// GET /files/{id} — inline preview.
pub async fn preview(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    serve_document(&pool, &session, &config, &req, path.into_inner(), false).await
}

/// GET /files/{id}/download — attachment download.
pub async fn download(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    serve_document(&pool, &session, &config, &req, path.into_inner(), true).await
}
