//! # Identity Rules
//!
//! Input validation, credential comparison, and the display-name
//! fallback chain.
//!
//! The browser original delegated format checks to its forms and fell
//! back through `name -> email local part -> "User"` with ad-hoc duck
//! typing. Here both live at the store boundary as plain functions,
//! testable without any UI.

use crate::primitives::{
    MAX_COURSE_ID_LENGTH, MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MAX_PASSWORD_LENGTH,
    MIN_PASSWORD_LENGTH,
};
use crate::{CourseId, StoreError};
use subtle::ConstantTimeEq;

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate signup input before anything is persisted.
///
/// Rules are intentionally minimal: the store rejects only input that
/// could not belong to any legitimate account.
pub fn validate_signup(name: &str, email: &str, password: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("name must not be blank".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(StoreError::Validation(format!(
            "name exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }
    validate_email(email)?;
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(StoreError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(StoreError::Validation(format!(
            "password exceeds {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Validate an email's shape: one `@` with a non-empty local part and
/// domain, no whitespace.
pub fn validate_email(email: &str) -> Result<(), StoreError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(StoreError::Validation(format!(
            "email exceeds {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(StoreError::Validation(
            "email must not contain whitespace".to_string(),
        ));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(StoreError::Validation(
            "email must contain '@'".to_string(),
        ));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(StoreError::Validation("malformed email".to_string()));
    }
    Ok(())
}

/// Validate a course id before it is used as a record key.
pub fn validate_course_id(course: &CourseId) -> Result<(), StoreError> {
    if course.as_str().is_empty() {
        return Err(StoreError::Validation(
            "course id must not be empty".to_string(),
        ));
    }
    if course.as_str().len() > MAX_COURSE_ID_LENGTH {
        return Err(StoreError::Validation(format!(
            "course id exceeds {} characters",
            MAX_COURSE_ID_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// CREDENTIAL COMPARISON
// =============================================================================

/// Compare a stored credential against a login attempt in constant time.
///
/// Both inputs are padded to the same length so `ct_eq` always runs over
/// the same number of bytes, preventing length-leaking side channels.
#[must_use]
pub fn verify_credential(stored: &str, provided: &str) -> bool {
    let stored_bytes = stored.as_bytes();
    let provided_bytes = provided.as_bytes();

    let max_len = stored_bytes.len().max(provided_bytes.len());
    let mut padded_stored = vec![0u8; max_len];
    let mut padded_provided = vec![0u8; max_len];
    padded_stored[..stored_bytes.len()].copy_from_slice(stored_bytes);
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);

    let bytes_match: bool = padded_stored.ct_eq(&padded_provided).into();
    bytes_match && stored_bytes.len() == provided_bytes.len()
}

// =============================================================================
// DISPLAY NAME
// =============================================================================

/// Fallback shown when neither a name nor a usable email is present.
pub const ANONYMOUS_DISPLAY_NAME: &str = "User";

/// Resolve a display name through the prioritized fallback chain:
/// non-blank name, then the email's local part, then a fixed default.
#[must_use]
pub fn display_name(name: Option<&str>, email: Option<&str>) -> String {
    if let Some(name) = name {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    if let Some(email) = email {
        let local = email.split('@').next().unwrap_or("");
        if !local.is_empty() {
            return local.to_string();
        }
    }
    ANONYMOUS_DISPLAY_NAME.to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signup_accepted() {
        assert!(validate_signup("Ada", "ada@example.com", "pw123").is_ok());
    }

    #[test]
    fn blank_name_rejected() {
        let result = validate_signup("   ", "ada@example.com", "pw123");
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn short_password_rejected() {
        let result = validate_signup("Ada", "ada@example.com", "pw");
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[test]
    fn malformed_emails_rejected() {
        for email in ["", "no-at-sign", "@example.com", "ada@", "a da@example.com"] {
            assert!(validate_email(email).is_err(), "accepted: {email:?}");
        }
    }

    #[test]
    fn empty_course_id_rejected() {
        let result = validate_course_id(&CourseId::new(""));
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(validate_course_id(&CourseId::new("course-1")).is_ok());
    }

    #[test]
    fn credential_comparison_exact_match_only() {
        assert!(verify_credential("pw123", "pw123"));
        assert!(!verify_credential("pw123", "pw124"));
        assert!(!verify_credential("pw123", "pw12"));
        assert!(!verify_credential("pw123", "pw1234"));
        assert!(!verify_credential("pw123", ""));
    }

    #[test]
    fn display_name_prefers_name() {
        assert_eq!(
            display_name(Some("Ada Lovelace"), Some("ada@example.com")),
            "Ada Lovelace"
        );
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        assert_eq!(display_name(None, Some("ada@example.com")), "ada");
        assert_eq!(display_name(Some("  "), Some("ada@example.com")), "ada");
    }

    #[test]
    fn display_name_final_fallback() {
        assert_eq!(display_name(None, None), ANONYMOUS_DISPLAY_NAME);
        assert_eq!(display_name(Some(""), Some("@example.com")), ANONYMOUS_DISPLAY_NAME);
    }
}
