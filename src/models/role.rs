use serde::{Deserialize, Serialize};

/// The four roles of the portal. Stored as text in the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
    Teacher,
    Language,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Language => "language",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "language" => Some(Role::Language),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Language => "Language Reviewer",
        }
    }

    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Student, Role::Teacher, Role::Language]
    }

    /// Permission codes granted to this role. Stored in the session as a CSV
    /// at login time.
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Role::Admin => &[
                "users.list",
                "users.create",
                "users.edit",
                "users.delete",
                "users.export",
                "records.list",
                "records.view",
                "records.create",
                "records.edit",
                "records.delete",
                "documents.view",
                "documents.delete",
                "documents.review",
                "documents.review.language",
                "permission.view",
                "permission.edit",
                "permission.delete",
                "audit.list",
                "account.edit",
            ],
            Role::Student => &[
                "records.view.own",
                "documents.upload",
                "documents.delete.own",
                "permission.create",
                "permission.edit.own",
                "account.edit",
            ],
            Role::Teacher => &[
                "records.list",
                "records.view",
                "documents.view",
                "documents.review",
                "permission.view",
                "account.edit",
            ],
            Role::Language => &[
                "records.list",
                "records.view",
                "documents.view",
                "documents.review.language",
                "permission.view",
                "account.edit",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips() {
        for role in Role::all() {
            assert_eq!(Role::parse(role.as_str()), Some(*role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn every_role_can_edit_own_account() {
        for role in Role::all() {
            assert!(role.permissions().contains(&"account.edit"));
        }
    }

    #[test]
    fn only_language_roles_review_language_certificates() {
        assert!(Role::Admin.permissions().contains(&"documents.review.language"));
        assert!(Role::Language.permissions().contains(&"documents.review.language"));
        assert!(!Role::Teacher.permissions().contains(&"documents.review.language"));
        assert!(!Role::Student.permissions().contains(&"documents.review.language"));
    }
}
