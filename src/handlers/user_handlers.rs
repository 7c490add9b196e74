use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::session::{get_user_id, require_permission, set_flash};
use crate::auth::{csrf, password, validate};
use crate::errors::{AppError, render};
use crate::models::role::Role;
use crate::models::table::{self, Column, RowAction};
use crate::models::user::{self, NewUser, UserDisplay, UserForm};
use crate::templates_structs::{
    PageContext, PageMeta, UserFormTemplate, UserFormValues, UserListTemplate,
};

const PER_PAGE: i64 = 25;

#[derive(Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub role: Option<String>,
    pub page: Option<i64>,
}

fn status_badge(u: &UserDisplay) -> String {
    format!("<span class=\"badge badge-{}\">{}</span>", u.status, u.status)
}

fn user_columns() -> Vec<Column<UserDisplay>> {
    vec![
        Column::text("name", "Name", |u: &UserDisplay| u.full_name()),
        Column::text("identification", "Identification", |u: &UserDisplay| {
            u.identification.clone()
        }),
        Column::text("email", "Email", |u: &UserDisplay| u.email.clone()),
        Column::text("role", "Role", |u: &UserDisplay| u.role_label().to_string()),
        Column::html("status", "Status", status_badge),
    ]
}

/// GET /users
/// Paginated user list with search and role filter. Queries shorter than the
/// minimum length are ignored.
pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.list")?;

    let search = validate::search_query(query.q.as_deref());
    let role_filter = query
        .role
        .as_deref()
        .and_then(Role::parse)
        .map(|r| r.as_str().to_string());
    let page = query.page.unwrap_or(1);

    let user_page =
        user::find_paginated(&pool, page, PER_PAGE, search.as_deref(), role_filter.as_deref())
            .await?;

    let current_user_id = get_user_id(&session).unwrap_or(0);
    let table = table::build(
        &user_page.users,
        &user_columns(),
        &[RowAction::Edit, RowAction::Delete],
        |action, u| match action {
            RowAction::Edit => Some(format!("/users/{}/edit", u.id)),
            // No self-deletion control
            RowAction::Delete if u.id != current_user_id => {
                Some(format!("/users/{}/delete", u.id))
            }
            _ => None,
        },
    );

    let mut base_url = String::from("/users?");
    if let Some(q) = &search {
        base_url.push_str(&format!("q={q}&"));
    }
    if let Some(r) = &role_filter {
        base_url.push_str(&format!("role={r}&"));
    }
    let pager = PageMeta::new(user_page.page, user_page.total_count, user_page.total_pages, base_url);

    let ctx = PageContext::build(&session, &pool, "/users").await?;
    let tmpl = UserListTemplate {
        ctx,
        table,
        pager,
        search_query: search.unwrap_or_default(),
        role_filter: role_filter.unwrap_or_default(),
    };
    render(tmpl)
}

/// GET /users/export
/// CSV export of the filtered user list.
pub async fn export_csv(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.export")?;

    let search = validate::search_query(query.q.as_deref());
    let role_filter = query.role.as_deref().and_then(Role::parse).map(|r| r.as_str());

    let users = user::find_all_filtered(&pool, search.as_deref(), role_filter).await?;

    let uid = get_user_id(&session).unwrap_or(0);
    let _ = crate::audit::log(
        &pool,
        uid,
        "users.export",
        "user",
        0,
        serde_json::json!({
            "count": users.len(),
            "format": "csv",
            "summary": format!("Exported {} users as CSV", users.len())
        }),
    )
    .await;

    fn escape_csv(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }

    let mut csv =
        String::from("id,first_name,last_name,identification,email,role,status,semester,career,created_at\n");
    for u in &users {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            u.id,
            escape_csv(&u.first_name),
            escape_csv(&u.last_name),
            escape_csv(&u.identification),
            escape_csv(&u.email),
            u.role,
            u.status,
            u.semester_display(),
            escape_csv(&u.career_display()),
            u.created_at,
        ));
    }

    let today = Local::now().format("%Y-%m-%d");
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"users-{today}.csv\""),
        ))
        .body(csv))
}

/// Validate the user form. Returns the parsed pieces alongside any errors.
fn validate_user_form(form: &UserForm, is_create: bool) -> (Vec<String>, Option<Role>, Option<i16>) {
    let mut errors = vec![];

    errors.extend(validate::validate_name(&form.first_name, "First name"));
    errors.extend(validate::validate_name(&form.last_name, "Last name"));
    errors.extend(validate::validate_required(&form.identification, "Identification", 40));
    errors.extend(validate::validate_email(&form.email));
    errors.extend(validate::validate_optional(&form.career, "Career", 120));

    if is_create || !form.password.is_empty() {
        errors.extend(validate::validate_password(&form.password));
    }

    let role = Role::parse(form.role.trim());
    if role.is_none() {
        errors.push("Role is required".to_string());
    }

    let semester = if form.semester.trim().is_empty() {
        None
    } else {
        match form.semester.trim().parse::<i16>() {
            Ok(s) if (1..=12).contains(&s) => Some(s),
            _ => {
                errors.push("Semester must be between 1 and 12".to_string());
                None
            }
        }
    };

    (errors, role, semester)
}

fn to_new_user(form: &UserForm, role: Role, semester: Option<i16>, password_hash: String) -> NewUser {
    let status = if form.status.trim().is_empty() {
        "active".to_string()
    } else {
        form.status.trim().to_string()
    };
    NewUser {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        identification: form.identification.trim().to_string(),
        email: form.email.trim().to_string(),
        password: password_hash,
        role,
        status,
        semester,
        career: if form.career.trim().is_empty() {
            None
        } else {
            Some(form.career.trim().to_string())
        },
    }
}

/// GET /users/new
pub async fn new_form(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.create")?;

    let ctx = PageContext::build(&session, &pool, "/users").await?;
    let tmpl = UserFormTemplate {
        ctx,
        form_action: "/users".to_string(),
        form_title: "Create User".to_string(),
        values: UserFormValues::empty(),
        is_create: true,
        errors: vec![],
    };
    render(tmpl)
}

/// POST /users
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<UserForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.create")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let (errors, role, semester) = validate_user_form(&form, true);
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &pool, "/users").await?;
        let tmpl = UserFormTemplate {
            ctx,
            form_action: "/users".to_string(),
            form_title: "Create User".to_string(),
            values: UserFormValues::from_form(&form),
            is_create: true,
            errors,
        };
        return render(tmpl);
    }

    let hashed = password::hash_password(&form.password)
        .map_err(|_| AppError::Hash("Password hash error".to_string()))?;
    let new = to_new_user(&form, role.expect("validated"), semester, hashed);

    match user::create(&pool, &new).await {
        Ok(user_id) => {
            let current_user_id = get_user_id(&session).unwrap_or(0);
            let details = serde_json::json!({
                "email": &new.email,
                "role": new.role.as_str(),
                "summary": format!("Created user '{} {}'", new.first_name, new.last_name)
            });
            let _ = crate::audit::log(&pool, current_user_id, "user.created", "user", user_id, details)
                .await;

            set_flash(&session, "success", "User created successfully");
            Ok(HttpResponse::SeeOther()
                .insert_header(("Location", "/users"))
                .finish())
        }
        Err(e) => {
            let msg = if e.to_string().contains("duplicate key") {
                "A user with that email or identification already exists".to_string()
            } else {
                format!("Error creating user: {e}")
            };
            let ctx = PageContext::build(&session, &pool, "/users").await?;
            let tmpl = UserFormTemplate {
                ctx,
                form_action: "/users".to_string(),
                form_title: "Create User".to_string(),
                values: UserFormValues::from_form(&form),
                is_create: true,
                errors: vec![msg],
            };
            render(tmpl)
        }
    }
}

/// GET /users/{id}/edit
pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.edit")?;

    let user_id = path.into_inner();
    let existing = user::find_display_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let ctx = PageContext::build(&session, &pool, "/users").await?;
    let tmpl = UserFormTemplate {
        ctx,
        form_action: format!("/users/{user_id}"),
        form_title: "Edit User".to_string(),
        values: UserFormValues::from_display(&existing),
        is_create: false,
        errors: vec![],
    };
    render(tmpl)
}

/// POST /users/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<UserForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let user_id = path.into_inner();
    user::find_display_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let (errors, role, semester) = validate_user_form(&form, false);
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &pool, "/users").await?;
        let tmpl = UserFormTemplate {
            ctx,
            form_action: format!("/users/{user_id}"),
            form_title: "Edit User".to_string(),
            values: UserFormValues::from_form(&form),
            is_create: false,
            errors,
        };
        return render(tmpl);
    }

    let password_hash = if form.password.is_empty() {
        None
    } else {
        Some(
            password::hash_password(&form.password)
                .map_err(|_| AppError::Hash("Password hash error".to_string()))?,
        )
    };

    let new = to_new_user(&form, role.expect("validated"), semester, String::new());
    user::update(&pool, user_id, &new, password_hash.as_deref()).await?;

    let current_user_id = get_user_id(&session).unwrap_or(0);
    let details = serde_json::json!({
        "email": &new.email,
        "role": new.role.as_str(),
        "summary": format!("Updated user '{} {}'", new.first_name, new.last_name)
    });
    let _ = crate::audit::log(&pool, current_user_id, "user.updated", "user", user_id, details).await;

    set_flash(&session, "success", "User updated successfully");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/users"))
        .finish())
}

/// POST /users/{id}/delete
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<crate::handlers::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.delete")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let user_id = path.into_inner();
    let current_user_id = get_user_id(&session).unwrap_or(0);
    if user_id == current_user_id {
        set_flash(&session, "error", "You cannot delete your own account");
        return Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/users"))
            .finish());
    }

    let existing = user::find_display_by_id(&pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    user::delete(&pool, user_id).await?;

    let details = serde_json::json!({
        "email": &existing.email,
        "summary": format!("Deleted user '{}'", existing.full_name())
    });
    let _ = crate::audit::log(&pool, current_user_id, "user.deleted", "user", user_id, details).await;

    set_flash(&session, "success", "User deleted successfully");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/users"))
        .finish())
}
