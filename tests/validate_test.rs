//! Form validation tests — required/optional fields, email and password
//! rules, and the minimum-length search guard.

use acadoc::auth::validate::{
    MIN_SEARCH_LEN, search_query, validate_email, validate_name, validate_optional,
    validate_password, validate_required,
};
use acadoc::models::user::UserForm;

#[test]
fn test_validate_name() {
    assert!(validate_name("Ana", "First name").is_none());
    assert!(validate_name("  ", "First name").is_some());
    assert!(validate_name(&"x".repeat(81), "First name").is_some());
}

#[test]
fn test_validate_email() {
    assert!(validate_email("student@university.edu").is_none());
    assert!(validate_email("").is_some());
    assert!(validate_email("not-an-email").is_some());
    assert!(validate_email("missing@dot").is_some());
}

#[test]
fn test_validate_password_min_length() {
    assert!(validate_password("longenough").is_none());
    assert!(validate_password("short").is_some());
    assert!(validate_password("").is_some());
}

#[test]
fn test_validate_required_trims() {
    assert!(validate_required("REC-001", "Record code", 40).is_none());
    assert!(validate_required("   ", "Record code", 40).is_some());
    assert!(validate_required(&"x".repeat(41), "Record code", 40).is_some());
}

#[test]
fn test_validate_optional_allows_empty() {
    assert!(validate_optional("", "Career", 120).is_none());
    assert!(validate_optional("Computer Science", "Career", 120).is_none());
    assert!(validate_optional(&"x".repeat(121), "Career", 120).is_some());
}

#[test]
fn test_user_form_optional_fields_default_empty() {
    // Browsers omit unchecked/empty optional fields; the form must still parse
    let body = "first_name=Ana&last_name=Lopez&identification=A-100&email=ana%40u.edu\
                &role=student&csrf_token=tok";
    let form: UserForm = serde_urlencoded::from_str(body).expect("Failed to parse form");

    assert_eq!(form.first_name, "Ana");
    assert_eq!(form.email, "ana@u.edu");
    assert!(form.password.is_empty());
    assert!(form.status.is_empty());
    assert!(form.semester.is_empty());
    assert!(form.career.is_empty());
}

#[test]
fn test_search_guard_ignores_short_queries() {
    assert_eq!(search_query(None), None);
    assert_eq!(search_query(Some("")), None);
    assert_eq!(search_query(Some("ab")), None);
    assert_eq!(search_query(Some("  a  ")), None);
    assert_eq!(search_query(Some("ana")), Some("ana".to_string()));
    assert_eq!(search_query(Some("  maria  ")), Some("maria".to_string()));
    assert!(MIN_SEARCH_LEN >= 2);
}
