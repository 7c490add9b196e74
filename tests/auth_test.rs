//! Authentication tests — covers password hashing, verification, and the
//! constant-time CSRF token comparison.

use acadoc::auth::csrf::constant_time_eq;
use acadoc::auth::password;

const TEST_PASSWORD: &str = "password123";

#[test]
fn test_hash_password_success() {
    let hash = password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash password");

    assert!(!hash.is_empty());
    assert!(hash.len() > 20); // Argon2 hashes are long
}

#[test]
fn test_hash_is_phc_encoded_argon2() {
    let hash = password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash password");

    let phc = regex::Regex::new(r"^\$argon2[a-z]+\$v=\d+\$").unwrap();
    assert!(phc.is_match(&hash), "unexpected hash format: {hash}");
}

#[test]
fn test_verify_password_correct() {
    let hash = password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash password");

    let verified = password::verify_password(TEST_PASSWORD, &hash)
        .expect("Verification failed");

    assert!(verified);
}

#[test]
fn test_verify_password_incorrect() {
    let hash = password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash password");

    let verified = password::verify_password("wrongpassword", &hash)
        .expect("Verification failed");

    assert!(!verified);
}

#[test]
fn test_verify_password_bad_hash_is_error() {
    assert!(password::verify_password(TEST_PASSWORD, "not-a-phc-string").is_err());
}

#[test]
fn test_hash_password_randomness() {
    let hash1 = password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash first password");
    let hash2 = password::hash_password(TEST_PASSWORD)
        .expect("Failed to hash second password");

    // Same password should produce different hashes (different salts)
    assert_ne!(hash1, hash2);

    // But both hashes should verify with the same password
    assert!(password::verify_password(TEST_PASSWORD, &hash1)
        .expect("Verification 1 failed"));
    assert!(password::verify_password(TEST_PASSWORD, &hash2)
        .expect("Verification 2 failed"));
}

#[test]
fn test_constant_time_eq_matches_equality() {
    assert!(constant_time_eq("abc123", "abc123"));
    assert!(!constant_time_eq("abc123", "abc124"));
    assert!(!constant_time_eq("abc123", "abc12"));
    assert!(!constant_time_eq("", "x"));
    assert!(constant_time_eq("", ""));
}
