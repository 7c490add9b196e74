use serde::Deserialize;
use sqlx::PgPool;

use crate::models::role::Role;

/// Internal user struct for authentication — includes the password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub status: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Safe version for templates — no password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserDisplay {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub identification: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub semester: Option<i16>,
    pub career: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserDisplay {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn role_label(&self) -> &'static str {
        Role::parse(&self.role).map(|r| r.label()).unwrap_or("Unknown")
    }

    pub fn semester_display(&self) -> String {
        self.semester.map(|s| s.to_string()).unwrap_or_default()
    }

    pub fn career_display(&self) -> String {
        self.career.clone().unwrap_or_default()
    }
}

/// Pagination metadata for the user list.
pub struct UserPage {
    pub users: Vec<UserDisplay>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub first_name: String,
    pub last_name: String,
    pub identification: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub career: String,
    pub csrf_token: String,
}

pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub identification: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub status: String,
    pub semester: Option<i16>,
    pub career: Option<String>,
}

const SELECT_USER_DISPLAY: &str = "\
    SELECT u.id, u.first_name, u.last_name, u.identification, u.email, \
           u.role, u.status, u.semester, u.career, \
           to_char(u.created_at, 'YYYY-MM-DD HH24:MI') AS created_at, \
           to_char(u.updated_at, 'YYYY-MM-DD HH24:MI') AS updated_at \
    FROM users u";

/// Matches everything when no search/role filter is set: the pattern falls
/// back to '%' and the role filter to the empty string.
const WHERE_FILTERED: &str = "\
    WHERE (u.first_name || ' ' || u.last_name ILIKE $1 \
           OR u.email ILIKE $1 OR u.identification ILIKE $1) \
      AND ($2 = '' OR u.role = $2)";

fn like_pattern(search: Option<&str>) -> String {
    match search {
        Some(q) => format!("%{}%", q.trim()),
        None => "%".to_string(),
    }
}

/// Find users with pagination and optional search / role filter.
pub async fn find_paginated(
    pool: &PgPool,
    page: i64,
    per_page: i64,
    search: Option<&str>,
    role: Option<&str>,
) -> Result<UserPage, sqlx::Error> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let pattern = like_pattern(search);
    let role_filter = role.unwrap_or("");

    let total_count: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users u {WHERE_FILTERED}"))
            .bind(&pattern)
            .bind(role_filter)
            .fetch_one(pool)
            .await?;

    let users = sqlx::query_as::<_, UserDisplay>(&format!(
        "{SELECT_USER_DISPLAY} {WHERE_FILTERED} ORDER BY u.id LIMIT $3 OFFSET $4"
    ))
    .bind(&pattern)
    .bind(role_filter)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_pages = ((total_count as f64) / (per_page as f64)).ceil() as i64;

    Ok(UserPage { users, page, per_page, total_count, total_pages })
}

/// Return all users matching the filter (no pagination) — used for CSV export.
pub async fn find_all_filtered(
    pool: &PgPool,
    search: Option<&str>,
    role: Option<&str>,
) -> Result<Vec<UserDisplay>, sqlx::Error> {
    sqlx::query_as::<_, UserDisplay>(&format!(
        "{SELECT_USER_DISPLAY} {WHERE_FILTERED} ORDER BY u.id"
    ))
    .bind(like_pattern(search))
    .bind(role.unwrap_or(""))
    .fetch_all(pool)
    .await
}

pub async fn find_display_by_id(pool: &PgPool, id: i64) -> Result<Option<UserDisplay>, sqlx::Error> {
    sqlx::query_as::<_, UserDisplay>(&format!("{SELECT_USER_DISPLAY} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Find a user by email for authentication. Returns the internal struct with
/// the password hash.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, first_name, last_name, email, password, role, status \
         FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await
}

pub async fn count_by_role(pool: &PgPool, role: Role) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
        .bind(role.as_str())
        .fetch_one(pool)
        .await
}

pub async fn create(pool: &PgPool, new: &NewUser) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO users (first_name, last_name, identification, email, password, role, status, semester, career) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.identification)
    .bind(&new.email)
    .bind(&new.password)
    .bind(new.role.as_str())
    .bind(&new.status)
    .bind(new.semester)
    .bind(&new.career)
    .fetch_one(pool)
    .await
}

/// Update a user. The password is only replaced when provided.
pub async fn update(
    pool: &PgPool,
    id: i64,
    form: &NewUser,
    password: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET first_name = $1, last_name = $2, identification = $3, \
         email = $4, role = $5, status = $6, semester = $7, career = $8, \
         updated_at = now() WHERE id = $9",
    )
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(&form.identification)
    .bind(&form.email)
    .bind(form.role.as_str())
    .bind(&form.status)
    .bind(form.semester)
    .bind(&form.career)
    .bind(id)
    .execute(pool)
    .await?;

    if let Some(pw) = password {
        update_password(pool, id, pw).await?;
    }
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find_password_hash_by_id(pool: &PgPool, id: i64) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT password FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password = $1, updated_at = now() WHERE id = $2")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Option row for the record creation form: active students without a record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentOption {
    pub id: i64,
    pub full_name: String,
    pub identification: String,
}

pub async fn students_without_record(pool: &PgPool) -> Result<Vec<StudentOption>, sqlx::Error> {
    sqlx::query_as::<_, StudentOption>(
        "SELECT u.id, u.first_name || ' ' || u.last_name AS full_name, u.identification \
         FROM users u \
         LEFT JOIN records r ON r.user_id = u.id \
         WHERE u.role = 'student' AND u.status = 'active' AND r.id IS NULL \
         ORDER BY u.last_name, u.first_name",
    )
    .fetch_all(pool)
    .await
}
