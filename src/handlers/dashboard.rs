use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::{Local, Timelike};
use sqlx::PgPool;

use crate::audit;
use crate::auth::session::{get_permissions, get_record_id, get_role};
use crate::errors::{AppError, render};
use crate::models::document::{self, DocKind, DocStatus};
use crate::models::role::Role;
use crate::models::{record, user};
use crate::templates_structs::{AdminStats, DashboardTemplate, PageContext, ReviewPanel, StudentPanel};

fn time_greeting(name: &str) -> String {
    let hour = Local::now().hour();
    let period = match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    };
    format!("{period}, {name}")
}

pub async fn index(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(&session, &pool, "/dashboard").await?;
    let greeting = time_greeting(&ctx.display_name);
    let role = get_role(&session);
    let permissions = get_permissions(&session).unwrap_or_default();

    let admin = if role == Some(Role::Admin) {
        Some(AdminStats {
            user_count: user::count(&pool).await?,
            student_count: user::count_by_role(&pool, Role::Student).await?,
            record_count: record::count(&pool).await?,
            pending_count: document::count_by_status(&pool, DocStatus::Pending).await?,
            audit_count: audit::count(&pool).await?,
            recent_activity: audit::find_recent(&pool, 5).await.unwrap_or_default(),
        })
    } else {
        None
    };

    let student = if role == Some(Role::Student) {
        let rec = match get_record_id(&session) {
            Some(id) => record::find_display_by_id(&pool, id).await?,
            None => None,
        };
        let progress = match &rec {
            Some(r) => {
                let docs = document::find_by_record(&pool, r.id).await?;
                DocKind::all()
                    .iter()
                    .map(|k| document::progress(*k, &docs))
                    .collect()
            }
            None => vec![],
        };
        let (record_id, record_code) = match &rec {
            Some(r) => (r.id, r.code.clone()),
            None => (0, String::new()),
        };
        Some(StudentPanel { record_id, record_code, progress })
    } else {
        None
    };

    // Teachers and language reviewers (and admins, via the queue page) see
    // their pending workload; the dashboard panel is for the two reviewer
    // roles only.
    let review = match (role, document::review_scope(&permissions)) {
        (Some(Role::Teacher), Some(scope)) | (Some(Role::Language), Some(scope)) => {
            let queue = document::find_pending(&pool, scope).await?;
            Some(ReviewPanel {
                pending_count: queue.len() as i64,
                queue: queue.into_iter().take(5).collect(),
            })
        }
        _ => None,
    };

    let tmpl = DashboardTemplate { ctx, greeting, admin, student, review };
    render(tmpl)
}
