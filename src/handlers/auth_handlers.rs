use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::rate_limit::RateLimiter;
use crate::auth::{csrf, password, session as auth_session};
use crate::errors::{AppError, render};
use crate::models::role::Role;
use crate::models::{record, setting, user};
use crate::templates_structs::LoginTemplate;

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

pub async fn login_page(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    // If already logged in, redirect to dashboard
    if auth_session::get_user_id(&session).is_some() {
        return Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/dashboard"))
            .finish());
    }

    let app_name = setting::get_value(&pool, "app.name", "Academic Document Portal").await;
    let csrf_token = csrf::get_or_create_token(&session);
    let tmpl = LoginTemplate { error: None, app_name, csrf_token };
    render(tmpl)
}

async fn login_error(
    pool: &PgPool,
    session: &Session,
    message: &str,
) -> Result<HttpResponse, AppError> {
    let app_name = setting::get_value(pool, "app.name", "Academic Document Portal").await;
    let csrf_token = csrf::get_or_create_token(session);
    let tmpl = LoginTemplate {
        error: Some(message.to_string()),
        app_name,
        csrf_token,
    };
    render(tmpl)
}

pub async fn login_submit(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check BEFORE any database access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        return login_error(
            &pool,
            &session,
            "Too many failed login attempts. Please try again later.",
        )
        .await;
    }

    let found = user::find_by_email(&pool, form.email.trim()).await?;

    let Some(u) = found else {
        limiter.record_failure(ip);
        return login_error(&pool, &session, "Invalid email or password").await;
    };

    if !matches!(password::verify_password(&form.password, &u.password), Ok(true)) {
        limiter.record_failure(ip);
        return login_error(&pool, &session, "Invalid email or password").await;
    }

    if !u.is_active() {
        return login_error(&pool, &session, "This account has been deactivated").await;
    }

    let Some(role) = Role::parse(&u.role) else {
        log::error!("User {} has unknown role `{}`", u.id, u.role);
        return login_error(&pool, &session, "Invalid email or password").await;
    };

    // Successful login — clear rate limit for this IP
    limiter.clear(ip);

    // Students carry their record id in the session; staff roles do not.
    let record_id = if role == Role::Student {
        record::find_by_user_id(&pool, u.id).await?.map(|r| r.id)
    } else {
        None
    };

    auth_session::start(&session, u.id, &u.full_name(), role, record_id);

    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/dashboard"))
        .finish())
}

pub async fn logout(session: Session, form: web::Form<CsrfOnly>) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/login"))
        .finish())
}
