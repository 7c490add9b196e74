use actix_session::Session;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::role::Role;

/// Wrapper around permission codes with a `has()` method for use in Askama
/// templates.
#[derive(Debug, Clone, Default)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }

    pub fn from_csv(csv: &str) -> Self {
        let codes = csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Permissions(codes)
    }

    pub fn of_role(role: Role) -> Self {
        Permissions(role.permissions().iter().map(|s| s.to_string()).collect())
    }
}

/// The authenticated user as stored in the cookie session. Students carry
/// the id of their academic record; staff roles have none.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub display_name: String,
    pub role: Role,
    pub record_id: Option<i64>,
}

/// A one-shot notification banner, rendered on the next page load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub kind: String, // "success" | "error"
    pub message: String,
}

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

pub fn get_display_name(session: &Session) -> Result<String, String> {
    match session.get::<String>("display_name") {
        Ok(Some(name)) => Ok(name),
        Ok(None) => Err("No display name in session".to_string()),
        Err(e) => Err(format!("Session error: {e}")),
    }
}

pub fn get_role(session: &Session) -> Option<Role> {
    session
        .get::<String>("role")
        .unwrap_or(None)
        .as_deref()
        .and_then(Role::parse)
}

pub fn get_record_id(session: &Session) -> Option<i64> {
    session.get::<i64>("record_id").unwrap_or(None)
}

pub fn get_permissions(session: &Session) -> Result<Permissions, String> {
    match session.get::<String>("permissions") {
        Ok(Some(csv)) => Ok(Permissions::from_csv(&csv)),
        Ok(None) => Err("No permissions in session".to_string()),
        Err(e) => Err(format!("Session error: {e}")),
    }
}

/// Read the whole authenticated-user state, or None when signed out.
pub fn current_user(session: &Session) -> Option<CurrentUser> {
    let id = get_user_id(session)?;
    let role = get_role(session)?;
    let display_name = get_display_name(session).unwrap_or_default();
    Some(CurrentUser {
        id,
        display_name,
        role,
        record_id: get_record_id(session),
    })
}

/// Populate the session after a successful login.
pub fn start(session: &Session, user_id: i64, display_name: &str, role: Role, record_id: Option<i64>) {
    let perms_csv = role.permissions().join(",");
    let _ = session.insert("user_id", user_id);
    let _ = session.insert("display_name", display_name);
    let _ = session.insert("role", role.as_str());
    let _ = session.insert("permissions", perms_csv);
    if let Some(rid) = record_id {
        let _ = session.insert("record_id", rid);
    }
}

pub fn set_flash(session: &Session, kind: &str, message: &str) {
    let _ = session.insert(
        "flash",
        Flash {
            kind: kind.to_string(),
            message: message.to_string(),
        },
    );
}

pub fn take_flash(session: &Session) -> Option<Flash> {
    let flash = session.get::<Flash>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

/// Check permission; returns Err(AppError) if denied.
pub fn require_permission(session: &Session, code: &str) -> Result<(), AppError> {
    let permissions = get_permissions(session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {e}")))?;

    if permissions.has(code) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_from_csv_trims_and_skips_empty() {
        let perms = Permissions::from_csv(" users.list , ,records.view,");
        assert!(perms.has("users.list"));
        assert!(perms.has("records.view"));
        assert_eq!(perms.0.len(), 2);
    }

    #[test]
    fn permissions_of_role_match_catalog() {
        let perms = Permissions::of_role(Role::Teacher);
        assert!(perms.has("documents.review"));
        assert!(!perms.has("users.delete"));
    }
}
