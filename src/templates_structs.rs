use actix_session::Session;
use askama::Template;
use sqlx::PgPool;

use crate::audit::AuditEntry;
use crate::auth::csrf;
use crate::auth::session::{Flash, Permissions, get_display_name, get_permissions, get_role, take_flash};
use crate::errors::AppError;
use crate::models::document::{Document, KindProgress, PendingDocument, SlotEntry};
use crate::models::nav::{self, NavItem};
use crate::models::record::RecordDisplay;
use crate::models::setting;
use crate::models::table::Table;
use crate::models::user::{StudentOption, UserDisplay, UserForm};

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.display_name`, `ctx.nav_items`, etc.
pub struct PageContext {
    pub display_name: String,
    pub avatar_initial: String,
    pub role_label: String,
    pub permissions: Permissions,
    pub flash: Option<Flash>,
    pub nav_items: Vec<NavItem>,
    pub app_name: String,
    pub csrf_token: String,
}

impl PageContext {
    pub async fn build(
        session: &Session,
        pool: &PgPool,
        current_path: &str,
    ) -> Result<Self, AppError> {
        let display_name = get_display_name(session)
            .map_err(|e| AppError::Session(format!("Failed to get display name: {e}")))?;
        let permissions = get_permissions(session)
            .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;
        let role_label = get_role(session).map(|r| r.label().to_string()).unwrap_or_default();
        let flash = take_flash(session);
        let nav_items = nav::build_nav(&permissions, current_path);
        let app_name = setting::get_value(pool, "app.name", "Academic Document Portal").await;
        let csrf_token = csrf::get_or_create_token(session);
        let avatar_initial = display_name
            .chars()
            .next()
            .unwrap_or('?')
            .to_uppercase()
            .to_string();
        Ok(Self {
            display_name,
            avatar_initial,
            role_label,
            permissions,
            flash,
            nav_items,
            app_name,
            csrf_token,
        })
    }
}

/// Pagination footer shared by list pages. `base_url` already carries the
/// active filters and ends with `?` or `&`.
pub struct PageMeta {
    pub page: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub base_url: String,
}

impl PageMeta {
    pub fn new(page: i64, total_count: i64, total_pages: i64, base_url: String) -> Self {
        PageMeta { page, total_count, total_pages, base_url }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn prev_page(&self) -> i64 {
        self.page - 1
    }

    pub fn next_page(&self) -> i64 {
        self.page + 1
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
}

// --- Dashboard ---

pub struct AdminStats {
    pub user_count: i64,
    pub student_count: i64,
    pub record_count: i64,
    pub pending_count: i64,
    pub audit_count: i64,
    pub recent_activity: Vec<AuditEntry>,
}

/// Student panel: `record_id` is 0 while no record has been created yet.
pub struct StudentPanel {
    pub record_id: i64,
    pub record_code: String,
    pub progress: Vec<KindProgress>,
}

pub struct ReviewPanel {
    pub pending_count: i64,
    pub queue: Vec<PendingDocument>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub greeting: String,
    pub admin: Option<AdminStats>,
    pub student: Option<StudentPanel>,
    pub review: Option<ReviewPanel>,
}

// --- Users ---

#[derive(Template)]
#[template(path = "users/list.html")]
pub struct UserListTemplate {
    pub ctx: PageContext,
    pub table: Table,
    pub pager: PageMeta,
    pub search_query: String,
    pub role_filter: String,
}

/// Prefilled input values for the user form; built from the stored user,
/// the rejected submission, or empty for a fresh create form.
#[derive(Default)]
pub struct UserFormValues {
    pub first_name: String,
    pub last_name: String,
    pub identification: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub semester: String,
    pub career: String,
}

impl UserFormValues {
    pub fn empty() -> Self {
        UserFormValues {
            role: "student".to_string(),
            status: "active".to_string(),
            ..Default::default()
        }
    }

    pub fn from_display(u: &UserDisplay) -> Self {
        UserFormValues {
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            identification: u.identification.clone(),
            email: u.email.clone(),
            role: u.role.clone(),
            status: u.status.clone(),
            semester: u.semester_display(),
            career: u.career_display(),
        }
    }

    pub fn from_form(form: &UserForm) -> Self {
        UserFormValues {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            identification: form.identification.clone(),
            email: form.email.clone(),
            role: form.role.clone(),
            status: form.status.clone(),
            semester: form.semester.clone(),
            career: form.career.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "users/form.html")]
pub struct UserFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub values: UserFormValues,
    pub is_create: bool,
    pub errors: Vec<String>,
}

// --- Records ---

#[derive(Template)]
#[template(path = "records/list.html")]
pub struct RecordListTemplate {
    pub ctx: PageContext,
    pub table: Table,
    pub pager: PageMeta,
    pub search_query: String,
}

#[derive(Template)]
#[template(path = "records/form.html")]
pub struct RecordFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub code: String,
    pub is_create: bool,
    pub students: Vec<StudentOption>,
    pub errors: Vec<String>,
}

/// One document group rendered on the record detail page. `upload_url` is
/// empty when the viewer may not upload into this record.
pub struct DocGroupView {
    pub kind_label: String,
    pub upload_url: String,
    pub table: Table,
}

#[derive(Template)]
#[template(path = "records/detail.html")]
pub struct RecordDetailTemplate {
    pub ctx: PageContext,
    pub record: RecordDisplay,
    pub groups: Vec<DocGroupView>,
    pub permissions_table: Table,
    pub permission_new_url: String,
}

// --- Documents ---

#[derive(Template)]
#[template(path = "documents/form.html")]
pub struct DocumentUploadTemplate {
    pub ctx: PageContext,
    pub record: RecordDisplay,
    pub kind_label: String,
    pub form_action: String,
    pub entries: Vec<SlotEntry>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "documents/queue.html")]
pub struct ReviewQueueTemplate {
    pub ctx: PageContext,
    pub table: Table,
}

#[derive(Template)]
#[template(path = "documents/review.html")]
pub struct ReviewTemplate {
    pub ctx: PageContext,
    pub document: Document,
    pub record: RecordDisplay,
    pub slot_label: String,
    pub preview_url: String,
    pub form_action: String,
}

// --- Permission documents ---

#[derive(Template)]
#[template(path = "permissions/form.html")]
pub struct PermissionFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub record: RecordDisplay,
    pub description: String,
    /// Name of the stored file when editing; empty on create.
    pub current_file: String,
    pub errors: Vec<String>,
}

// --- Account ---

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub errors: Vec<String>,
}

// --- Audit ---

#[derive(Template)]
#[template(path = "audit/list.html")]
pub struct AuditListTemplate {
    pub ctx: PageContext,
    pub table: Table,
    pub pager: PageMeta,
    pub actions: Vec<String>,
    pub action_filter: String,
    pub search_query: String,
}
