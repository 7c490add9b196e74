use actix_session::Session;

use crate::errors::AppError;
use crate::models::role::Role;

use super::session::{CurrentUser, current_user};

/// Outcome of the role gate for a protected page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Signed in with a permitted role; render the protected page.
    Allow,
    /// No authenticated user; send to the login entry point.
    Challenge,
    /// Signed in but the role is not permitted; show the forbidden page.
    Deny,
}

/// Pure gate: maps the current role (if any) and the permitted role set to a
/// decision. An empty allowed set admits any authenticated user.
pub fn evaluate(role: Option<Role>, allowed: &[Role]) -> GateDecision {
    match role {
        None => GateDecision::Challenge,
        Some(r) if allowed.is_empty() || allowed.contains(&r) => GateDecision::Allow,
        Some(_) => GateDecision::Deny,
    }
}

/// Session-backed gate: returns the authenticated user when the gate allows,
/// or the error that renders as a login redirect / forbidden page.
pub fn require_role(session: &Session, allowed: &[Role]) -> Result<CurrentUser, AppError> {
    let user = current_user(session);
    match evaluate(user.as_ref().map(|u| u.role), allowed) {
        GateDecision::Allow => Ok(user.expect("gate allowed without a user")),
        GateDecision::Challenge => Err(AppError::Unauthenticated),
        GateDecision::Deny => {
            let codes: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
            Err(AppError::PermissionDenied(format!("role:{}", codes.join("|"))))
        }
    }
}
