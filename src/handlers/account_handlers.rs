use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::session::{get_user_id, require_permission, set_flash};
use crate::auth::{csrf, password, validate};
use crate::errors::{AppError, render};
use crate::models::user;
use crate::templates_structs::{AccountTemplate, PageContext};

#[derive(Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
    pub csrf_token: String,
}

/// GET /account
pub async fn form(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "account.edit")?;

    let ctx = PageContext::build(&session, &pool, "/account").await?;
    render(AccountTemplate { ctx, errors: vec![] })
}

/// POST /account
/// Change the signed-in user's password; the current one is verified first.
pub async fn submit(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<PasswordForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "account.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let user_id = get_user_id(&session)
        .ok_or_else(|| AppError::Session("Not logged in".to_string()))?;

    let mut errors = vec![];
    errors.extend(validate::validate_password(&form.new_password));
    if form.new_password != form.confirm_password {
        errors.push("New passwords do not match".to_string());
    }

    if errors.is_empty() {
        let stored = user::find_password_hash_by_id(&pool, user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !matches!(password::verify_password(&form.current_password, &stored), Ok(true)) {
            errors.push("Current password is incorrect".to_string());
        }
    }

    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &pool, "/account").await?;
        return render(AccountTemplate { ctx, errors });
    }

    let hashed = password::hash_password(&form.new_password)
        .map_err(|_| AppError::Hash("Password hash error".to_string()))?;
    user::update_password(&pool, user_id, &hashed).await?;

    let details = serde_json::json!({ "summary": "Changed own password" });
    let _ = crate::audit::log(&pool, user_id, "account.password_changed", "user", user_id, details)
        .await;

    set_flash(&session, "success", "Password updated");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/account"))
        .finish())
}
