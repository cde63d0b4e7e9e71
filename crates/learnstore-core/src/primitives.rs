//! # Store Primitives
//!
//! Hardcoded limits and key names for the learnstore store.
//!
//! These are compiled into the binary and immutable at runtime. Input
//! that exceeds a limit is rejected at the store boundary with
//! `StoreError::Validation` before anything is persisted.

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// Maximum accepted password length.
///
/// Prevents memory exhaustion from pathological input.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum accepted display-name length.
pub const MAX_NAME_LENGTH: usize = 64;

/// Maximum accepted email length.
///
/// Matches the RFC 5321 path limit.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum accepted course-id length.
pub const MAX_COURSE_ID_LENGTH: usize = 64;

/// Maximum catalog JSON document size accepted by `Catalog::from_json`.
///
/// Validated BEFORE deserialization to prevent allocation-based
/// exhaustion from corrupted catalog files.
pub const MAX_CATALOG_JSON_SIZE: usize = 16 * 1024 * 1024; // 16 MB

// =============================================================================
// PERSISTED KEY NAMES
// =============================================================================

/// Key of the single session record.
///
/// One store serves one browser context, so the session table holds at
/// most this one entry.
pub const SESSION_KEY: &str = "current";

/// Metadata key holding the next user id to assign.
pub const META_NEXT_USER_ID: &str = "next_user_id";
