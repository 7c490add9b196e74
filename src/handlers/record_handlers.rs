use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::gate::require_role;
use crate::auth::session::{
    get_permissions, get_record_id, get_user_id, require_permission, set_flash,
};
use crate::auth::{csrf, validate};
use crate::models::role::Role;
use crate::errors::{AppError, render};
use crate::models::document::{self, DocKind, DocStatus, SlotEntry};
use crate::models::permission_doc::{self, PermissionDocument};
use crate::models::record::{self, RecordDisplay, RecordForm};
use crate::models::table::{self, Column, RowAction, Table};
use crate::models::user;
use crate::templates_structs::{
    DocGroupView, PageContext, PageMeta, RecordDetailTemplate, RecordFormTemplate,
    RecordListTemplate,
};

const PER_PAGE: i64 = 25;

#[derive(Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

/// Staff may open any record; students only their own.
pub fn ensure_record_access(session: &Session, record_id: i64) -> Result<(), AppError> {
    let permissions = get_permissions(session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
    if permissions.has("records.view") {
        return Ok(());
    }
    if permissions.has("records.view.own") && get_record_id(session) == Some(record_id) {
        return Ok(());
    }
    Err(AppError::PermissionDenied("records.view".to_string()))
}

/// GET /records
pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.list")?;

    let search = validate::search_query(query.q.as_deref());
    let page = query.page.unwrap_or(1);
    let record_page = record::find_paginated(&pool, page, PER_PAGE, search.as_deref()).await?;

    let permissions = get_permissions(&session).unwrap_or_default();
    let can_edit = permissions.has("records.edit");
    let can_delete = permissions.has("records.delete");

    let columns = vec![
        Column::text("code", "Code", |r: &RecordDisplay| r.code.clone()),
        Column::text("student", "Student", |r: &RecordDisplay| r.student_name.clone()),
        Column::text("identification", "Identification", |r: &RecordDisplay| {
            r.identification.clone()
        }),
        Column::text("semester", "Semester", |r: &RecordDisplay| r.semester_display()),
        Column::text("career", "Career", |r: &RecordDisplay| r.career_display()),
        Column::html("detail", "Detail", |r: &RecordDisplay| {
            format!("<a href=\"/records/{}\">Open</a>", r.id)
        }),
    ];

    let table = table::build(
        &record_page.records,
        &columns,
        &[RowAction::Edit, RowAction::Delete],
        |action, r| match action {
            RowAction::Edit if can_edit => Some(format!("/records/{}/edit", r.id)),
            RowAction::Delete if can_delete => Some(format!("/records/{}/delete", r.id)),
            _ => None,
        },
    );

    let mut base_url = String::from("/records?");
    if let Some(q) = &search {
        base_url.push_str(&format!("q={q}&"));
    }
    let pager = PageMeta::new(
        record_page.page,
        record_page.total_count,
        record_page.total_pages,
        base_url,
    );

    let ctx = PageContext::build(&session, &pool, "/records").await?;
    let tmpl = RecordListTemplate {
        ctx,
        table,
        pager,
        search_query: search.unwrap_or_default(),
    };
    render(tmpl)
}

/// GET /record
/// A student's shortcut to their own record detail.
pub async fn my_record(session: Session) -> Result<HttpResponse, AppError> {
    let user = require_role(&session, &[Role::Student])?;

    match user.record_id {
        Some(id) => Ok(HttpResponse::SeeOther()
            .insert_header(("Location", format!("/records/{id}")))
            .finish()),
        None => {
            set_flash(
                &session,
                "error",
                "No academic record has been created for your account yet",
            );
            Ok(HttpResponse::SeeOther()
                .insert_header(("Location", "/dashboard"))
                .finish())
        }
    }
}

fn slot_file_cell(e: &SlotEntry) -> String {
    match &e.document {
        Some(d) => d
            .file_path
            .rsplit('/')
            .next()
            .unwrap_or(d.file_path.as_str())
            .to_string(),
        None => "—".to_string(),
    }
}

fn slot_status_badge(e: &SlotEntry) -> String {
    match &e.document {
        None => "<span class=\"badge badge-missing\">Not uploaded</span>".to_string(),
        Some(d) => match d.status.as_deref() {
            Some(status) => format!(
                "<span class=\"badge badge-{status}\">{}</span>",
                d.status_label()
            ),
            None => "<span class=\"badge badge-plain\">On file</span>".to_string(),
        },
    }
}

fn slot_uploaded_cell(e: &SlotEntry) -> String {
    e.document
        .as_ref()
        .map(|d| d.uploaded_at.clone())
        .unwrap_or_default()
}

fn slot_columns() -> Vec<Column<SlotEntry>> {
    vec![
        Column::text("document", "Document", |e: &SlotEntry| e.spec.label.to_string()),
        Column::text("file", "File", slot_file_cell),
        Column::html("status", "Status", slot_status_badge),
        Column::text("uploaded", "Uploaded", slot_uploaded_cell),
    ]
}

/// Build the slot table of one document group for the current viewer.
fn group_view(
    record: &RecordDisplay,
    kind: DocKind,
    documents: &[document::Document],
    permissions: &crate::auth::session::Permissions,
    is_owner: bool,
) -> DocGroupView {
    let entries = document::slot_entries(kind, documents);

    let can_view_files = permissions.has("documents.view") || is_owner;
    let can_delete_any = permissions.has("documents.delete");
    let can_delete_own = is_owner && permissions.has("documents.delete.own");

    let mut permitted = vec![];
    if can_view_files {
        permitted.push(RowAction::Preview);
        permitted.push(RowAction::Download);
    }
    permitted.push(RowAction::Review);
    permitted.push(RowAction::Delete);

    let permissions = permissions.clone();
    let table: Table = table::build(&entries, &slot_columns(), &permitted, move |action, e| {
        let doc = e.document.as_ref()?;
        let approved = doc.status.as_deref() == Some(DocStatus::Approved.as_str());
        match action {
            RowAction::Preview => Some(format!("/files/{}", doc.id)),
            RowAction::Download => Some(format!("/files/{}/download", doc.id)),
            RowAction::Review
                if e.spec.can_review(&permissions)
                    && doc.status.as_deref() == Some(DocStatus::Pending.as_str()) =>
            {
                Some(format!("/reviews/{}", doc.id))
            }
            RowAction::Delete if can_delete_any || (can_delete_own && !approved) => {
                Some(format!("/documents/{}/delete", doc.id))
            }
            _ => None,
        }
    });

    let upload_url = if is_owner {
        format!("/records/{}/documents/{}", record.id, kind.as_str())
    } else {
        String::new()
    };

    DocGroupView {
        kind_label: kind.label().to_string(),
        upload_url,
        table,
    }
}

fn permission_columns() -> Vec<Column<PermissionDocument>> {
    vec![
        Column::text("description", "Description", |p: &PermissionDocument| {
            p.description.clone()
        }),
        Column::text("file", "File", |p: &PermissionDocument| {
            p.file_path
                .rsplit('/')
                .next()
                .unwrap_or(p.file_path.as_str())
                .to_string()
        }),
        Column::text("created", "Created", |p: &PermissionDocument| p.created_at.clone()),
        Column::text("updated", "Updated", |p: &PermissionDocument| p.updated_at.clone()),
    ]
}

/// GET /records/{id}
pub async fn detail(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let record_id = path.into_inner();
    ensure_record_access(&session, record_id)?;

    let rec = record::find_display_by_id(&pool, record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let permissions = get_permissions(&session).unwrap_or_default();
    let is_owner = get_record_id(&session) == Some(rec.id);

    let documents = document::find_by_record(&pool, rec.id).await?;
    let groups = DocKind::all()
        .iter()
        .map(|kind| group_view(&rec, *kind, &documents, &permissions, is_owner))
        .collect();

    let permission_docs = permission_doc::find_by_record(&pool, rec.id).await?;
    let can_edit_perm_any = permissions.has("permission.edit");
    let can_edit_perm_own = is_owner && permissions.has("permission.edit.own");
    let can_delete_perm = permissions.has("permission.delete") || is_owner;
    let permissions_table = table::build(
        &permission_docs,
        &permission_columns(),
        &[RowAction::Preview, RowAction::Download, RowAction::Edit, RowAction::Delete],
        |action, p| match action {
            RowAction::Preview => Some(format!("/permissions/{}/file", p.id)),
            RowAction::Download => Some(format!("/permissions/{}/file/download", p.id)),
            RowAction::Edit if can_edit_perm_any || can_edit_perm_own => {
                Some(format!("/permissions/{}/edit", p.id))
            }
            RowAction::Delete if can_delete_perm => Some(format!("/permissions/{}/delete", p.id)),
            _ => None,
        },
    );

    let permission_new_url = if is_owner && permissions.has("permission.create") {
        format!("/records/{}/permissions/new", rec.id)
    } else {
        String::new()
    };

    let ctx = PageContext::build(&session, &pool, "/records").await?;
    let tmpl = RecordDetailTemplate {
        ctx,
        record: rec,
        groups,
        permissions_table,
        permission_new_url,
    };
    render(tmpl)
}

/// GET /records/new
pub async fn new_form(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.create")?;

    let students = user::students_without_record(&pool).await?;
    let ctx = PageContext::build(&session, &pool, "/records").await?;
    let tmpl = RecordFormTemplate {
        ctx,
        form_action: "/records".to_string(),
        form_title: "Create Record".to_string(),
        code: String::new(),
        is_create: true,
        students,
        errors: vec![],
    };
    render(tmpl)
}

/// POST /records
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<RecordForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.create")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let mut errors = vec![];
    errors.extend(validate::validate_required(&form.code, "Record code", 40));
    let student_id = form.user_id.trim().parse::<i64>().ok();
    if student_id.is_none() {
        errors.push("A student must be selected".to_string());
    }

    if !errors.is_empty() {
        let students = user::students_without_record(&pool).await?;
        let ctx = PageContext::build(&session, &pool, "/records").await?;
        let tmpl = RecordFormTemplate {
            ctx,
            form_action: "/records".to_string(),
            form_title: "Create Record".to_string(),
            code: form.code.clone(),
            is_create: true,
            students,
            errors,
        };
        return render(tmpl);
    }

    let code = form.code.trim();
    match record::create(&pool, code, student_id.expect("validated")).await {
        Ok(record_id) => {
            let uid = get_user_id(&session).unwrap_or(0);
            let details = serde_json::json!({
                "code": code,
                "summary": format!("Created record '{code}'")
            });
            let _ = crate::audit::log(&pool, uid, "record.created", "record", record_id, details).await;

            set_flash(&session, "success", "Record created successfully");
            Ok(HttpResponse::SeeOther()
                .insert_header(("Location", format!("/records/{record_id}")))
                .finish())
        }
        Err(e) => {
            let msg = if e.to_string().contains("duplicate key") {
                "That record code is already in use, or the student already has a record".to_string()
            } else {
                format!("Error creating record: {e}")
            };
            let students = user::students_without_record(&pool).await?;
            let ctx = PageContext::build(&session, &pool, "/records").await?;
            let tmpl = RecordFormTemplate {
                ctx,
                form_action: "/records".to_string(),
                form_title: "Create Record".to_string(),
                code: form.code.clone(),
                is_create: true,
                students,
                errors: vec![msg],
            };
            render(tmpl)
        }
    }
}

/// GET /records/{id}/edit
pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.edit")?;

    let record_id = path.into_inner();
    let rec = record::find_display_by_id(&pool, record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let ctx = PageContext::build(&session, &pool, "/records").await?;
    let tmpl = RecordFormTemplate {
        ctx,
        form_action: format!("/records/{record_id}"),
        form_title: "Edit Record".to_string(),
        code: rec.code.clone(),
        is_create: false,
        students: vec![],
        errors: vec![],
    };
    render(tmpl)
}

/// POST /records/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<RecordForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let record_id = path.into_inner();
    let rec = record::find_display_by_id(&pool, record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut errors = vec![];
    errors.extend(validate::validate_required(&form.code, "Record code", 40));

    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &pool, "/records").await?;
        let tmpl = RecordFormTemplate {
            ctx,
            form_action: format!("/records/{record_id}"),
            form_title: "Edit Record".to_string(),
            code: form.code.clone(),
            is_create: false,
            students: vec![],
            errors,
        };
        return render(tmpl);
    }

    let code = form.code.trim();
    record::update_code(&pool, record_id, code).await?;

    let uid = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "code": code,
        "summary": format!("Updated record '{code}'")
    });
    let _ = crate::audit::log(&pool, uid, "record.updated", "record", record_id, details).await;

    set_flash(&session, "success", "Record updated successfully");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/records/{record_id}")))
        .finish())
}

/// POST /records/{id}/delete
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<crate::handlers::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.delete")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let record_id = path.into_inner();
    let rec = record::find_display_by_id(&pool, record_id)
        .await?
        .ok_or(AppError::NotFound)?;

    record::delete(&pool, record_id).await?;

    let uid = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "code": &rec.code,
        "summary": format!("Deleted record '{}'", rec.code)
    });
    let _ = crate::audit::log(&pool, uid, "record.deleted", "record", record_id, details).await;

    set_flash(&session, "success", "Record deleted successfully");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/records"))
        .finish())
}
