use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::PgPool;

use crate::auth::session::{get_permissions, get_record_id, get_user_id, require_permission, set_flash};
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::record_handlers::ensure_record_access;
use crate::models::permission_doc::{self, PermissionDocument};
use crate::models::record;
use crate::templates_structs::{PageContext, PermissionFormTemplate};
use crate::uploads::{self, UploadConfig};

const FILE_FIELD: &str = "file";

/// GET /records/{id}/permissions/new
pub async fn new_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "permission.create")?;

    let record_id = path.into_inner();
    if get_record_id(&session) != Some(record_id) {
        return Err(AppError::PermissionDenied("permission.create".to_string()));
    }
    let rec = record::find_display_by_id(&pool, record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let ctx = PageContext::build(&session, &pool, "/record").await?;
    let tmpl = PermissionFormTemplate {
        ctx,
        form_action: format!("/records/{record_id}/permissions"),
        form_title: "New Permission Document".to_string(),
        record: rec,
        description: String::new(),
        current_file: String::new(),
        errors: vec![],
    };
    render(tmpl)
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[allow(clippy::too_many_arguments)]
async fn form_with_errors(
    pool: &PgPool,
    session: &Session,
    form_action: String,
    form_title: &str,
    rec: record::RecordDisplay,
    description: String,
    current_file: String,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(session, pool, "/record").await?;
    let tmpl = PermissionFormTemplate {
        ctx,
        form_action,
        form_title: form_title.to_string(),
        record: rec,
        description,
        current_file,
        errors,
    };
    render(tmpl)
}

/// POST /records/{id}/permissions
/// Multipart: description text plus the supporting file. Both are required;
/// a missing one re-renders the form without creating anything.
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    path: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "permission.create")?;

    let record_id = path.into_inner();
    if get_record_id(&session) != Some(record_id) {
        return Err(AppError::PermissionDenied("permission.create".to_string()));
    }
    let rec = record::find_display_by_id(&pool, record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let subdir = format!("{}/permissions", rec.code);
    let form_action = format!("/records/{record_id}/permissions");

    let form = match uploads::collect(payload, &config, &subdir, &[FILE_FIELD]).await {
        Ok(form) => form,
        Err(AppError::Upload(msg)) => {
            return form_with_errors(
                &pool, &session, form_action, "New Permission Document", rec,
                String::new(), String::new(), vec![msg],
            )
            .await;
        }
        Err(e) => return Err(e),
    };

    csrf::validate_csrf(&session, form.text("csrf_token").unwrap_or(""))?;

    let description = form.text("description").unwrap_or("").trim().to_string();
    let mut errors = vec![];
    errors.extend(validate::validate_required(&description, "Description", 500));
    if form.file_for(FILE_FIELD).is_none() {
        errors.push("A supporting file is required".to_string());
    }

    if !errors.is_empty() {
        return form_with_errors(
            &pool, &session, form_action, "New Permission Document", rec,
            description, String::new(), errors,
        )
        .await;
    }

    let saved = form.file_for(FILE_FIELD).expect("checked above");
    let doc_id = permission_doc::create(&pool, record_id, &saved.relative_path, &description).await?;

    let uid = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "record": &rec.code,
        "file": &saved.stored_name,
        "summary": format!("Created permission document for record '{}'", rec.code)
    });
    let _ = crate::audit::log(&pool, uid, "permission.created", "permission_document", doc_id, details)
        .await;

    set_flash(&session, "success", "Permission document created");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/records/{record_id}")))
        .finish())
}

/// Permission documents may be edited by staff with `permission.edit` or by
/// the owning student.
async fn editable_doc(
    pool: &PgPool,
    session: &Session,
    doc_id: i64,
) -> Result<(PermissionDocument, record::RecordDisplay), AppError> {
    let doc = permission_doc::find_by_id(pool, doc_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let permissions = get_permissions(session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
    let is_owner = get_record_id(session) == Some(doc.record_id);
    let allowed = permissions.has("permission.edit")
        || (is_owner && permissions.has("permission.edit.own"));
    if !allowed {
        return Err(AppError::PermissionDenied("permission.edit".to_string()));
    }

    let rec = record::find_display_by_id(pool, doc.record_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((doc, rec))
}

/// GET /permissions/{id}/edit
pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let doc_id = path.into_inner();
    let (doc, rec) = editable_doc(&pool, &session, doc_id).await?;

    let ctx = PageContext::build(&session, &pool, "/record").await?;
    let tmpl = PermissionFormTemplate {
        ctx,
        form_action: format!("/permissions/{doc_id}"),
        form_title: "Edit Permission Document".to_string(),
        record: rec,
        description: doc.description.clone(),
        current_file: file_name(&doc.file_path),
        errors: vec![],
    };
    render(tmpl)
}

/// POST /permissions/{id}
/// Update the description; a newly uploaded file replaces the stored one.
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    path: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let doc_id = path.into_inner();
    let (doc, rec) = editable_doc(&pool, &session, doc_id).await?;

    let subdir = format!("{}/permissions", rec.code);
    let form_action = format!("/permissions/{doc_id}");

    let form = match uploads::collect(payload, &config, &subdir, &[FILE_FIELD]).await {
        Ok(form) => form,
        Err(AppError::Upload(msg)) => {
            return form_with_errors(
                &pool, &session, form_action, "Edit Permission Document", rec,
                doc.description.clone(), file_name(&doc.file_path), vec![msg],
            )
            .await;
        }
        Err(e) => return Err(e),
    };

    csrf::validate_csrf(&session, form.text("csrf_token").unwrap_or(""))?;

    let description = form.text("description").unwrap_or("").trim().to_string();
    let mut errors = vec![];
    errors.extend(validate::validate_required(&description, "Description", 500));

    if !errors.is_empty() {
        return form_with_errors(
            &pool, &session, form_action, "Edit Permission Document", rec,
            description, file_name(&doc.file_path), errors,
        )
        .await;
    }

    let replacement = form.file_for(FILE_FIELD);
    if let Some(saved) = replacement {
        if doc.file_path != saved.relative_path {
            uploads::remove_stored(&config, &doc.file_path).await;
        }
    }

    permission_doc::update(
        &pool,
        doc_id,
        &description,
        replacement.map(|s| s.relative_path.as_str()),
    )
    .await?;

    let uid = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "record": &rec.code,
        "replaced_file": replacement.is_some(),
        "summary": format!("Updated permission document for record '{}'", rec.code)
    });
    let _ = crate::audit::log(&pool, uid, "permission.updated", "permission_document", doc_id, details)
        .await;

    set_flash(&session, "success", "Permission document updated");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/records/{}", doc.record_id)))
        .finish())
}

/// POST /permissions/{id}/delete
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    path: web::Path<i64>,
    form: web::Form<crate::handlers::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let doc_id = path.into_inner();
    let doc = permission_doc::find_by_id(&pool, doc_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let permissions = get_permissions(&session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
    let is_owner = get_record_id(&session) == Some(doc.record_id);
    if !permissions.has("permission.delete") && !is_owner {
        return Err(AppError::PermissionDenied("permission.delete".to_string()));
    }

    permission_doc::delete(&pool, doc_id).await?;
    uploads::remove_stored(&config, &doc.file_path).await;

    let uid = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "summary": "Deleted permission document"
    });
    let _ = crate::audit::log(&pool, uid, "permission.deleted", "permission_document", doc_id, details)
        .await;

    set_flash(&session, "success", "Permission document deleted");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/records/{}", doc.record_id)))
        .finish())
}

async fn serve_file(
    pool: &PgPool,
    session: &Session,
    config: &UploadConfig,
    req: &HttpRequest,
    doc_id: i64,
    as_attachment: bool,
) -> Result<HttpResponse, AppError> {
    let doc = permission_doc::find_by_id(pool, doc_id)
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

/// GET /permissions/{id}/file
pub async fn preview(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    serve_file(&pool, &session, &config, &req, path.into_inner(), false).await
}

/// GET /permissions/{id}/file/download
pub async fn download(
    pool: web::Data<PgPool>,
    session: Session,
    config: web::Data<UploadConfig>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    serve_file(&pool, &session, &config, &req, path.into_inner(), true).await
}
