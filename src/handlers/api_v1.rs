//! Small JSON surface mirroring the HTML pages: session check plus read-only
//! user and record listings. Same session and permission guards as the pages.

use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::session::{current_user, require_permission};
use crate::auth::validate;
use crate::errors::AppError;
use crate::models::{record, user};

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

#[derive(Serialize)]
pub struct ApiSessionResponse {
    pub user_id: i64,
    pub display_name: String,
    pub role: String,
    pub record_id: Option<i64>,
}

#[derive(Serialize)]
pub struct ApiUserResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub identification: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub semester: Option<i16>,
    pub career: Option<String>,
}

impl From<user::UserDisplay> for ApiUserResponse {
    fn from(u: user::UserDisplay) -> Self {
        ApiUserResponse {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            identification: u.identification,
            email: u.email,
            role: u.role,
            status: u.status,
            semester: u.semester,
            career: u.career,
        }
    }
}

#[derive(Serialize)]
pub struct ApiRecordResponse {
    pub id: i64,
    pub code: String,
    pub user_id: i64,
    pub student_name: String,
}

impl From<record::RecordDisplay> for ApiRecordResponse {
    fn from(r: record::RecordDisplay) -> Self {
        ApiRecordResponse {
            id: r.id,
            code: r.code,
            user_id: r.user_id,
            student_name: r.student_name,
        }
    }
}

fn paging(query: &std::collections::HashMap<String, String>) -> (i64, i64) {
    let page = query
        .get("page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(1)
        .max(1);
    let per_page = query
        .get("per_page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(25)
        .clamp(1, 100);
    (page, per_page)
}

/// GET /api/v1/session - Who am I. 401 with a JSON body when signed out.
pub async fn session_check(session: Session) -> HttpResponse {
    match current_user(&session) {
        Some(u) => HttpResponse::Ok().json(ApiSessionResponse {
            user_id: u.id,
            display_name: u.display_name,
            role: u.role.as_str().to_string(),
            record_id: u.record_id,
        }),
        None => HttpResponse::Unauthorized().json(ApiErrorResponse {
            error: "Not authenticated".to_string(),
        }),
    }
}

/// GET /api/v1/users - List users with pagination and search.
pub async fn users(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.list")?;

    let (page, per_page) = paging(&query);
    let search = validate::search_query(query.get("q").map(|s| s.as_str()));

    let user_page = user::find_paginated(&pool, page, per_page, search.as_deref(), None).await?;

    let response = PaginatedResponse {
        items: user_page
            .users
            .into_iter()
            .map(ApiUserResponse::from)
            .collect::<Vec<_>>(),
        page: user_page.page,
        per_page: user_page.per_page,
        total: user_page.total_count,
    };
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/records - List records with pagination and search.
pub async fn records(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "records.list")?;

    let (page, per_page) = paging(&query);
    let search = validate::search_query(query.get("q").map(|s| s.as_str()));

    let record_page = record::find_paginated(&pool, page, per_page, search.as_deref()).await?;

    let response = PaginatedResponse {
        items: record_page
            .records
            .into_iter()
            .map(ApiRecordResponse::from)
            .collect::<Vec<_>>(),
        page: record_page.page,
        per_page: record_page.per_page,
        total: record_page.total_count,
    };
    Ok(HttpResponse::Ok().json(response))
}
