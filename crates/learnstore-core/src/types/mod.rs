//! # Core Type Definitions
//!
//! This module contains all record types for the learnstore session &
//! entitlement store:
//! - Identifiers (`UserId`, `CourseId`, `Timestamp`, `SessionToken`)
//! - Account records (`User`, `Session`)
//! - Playback bookmarks (`ProgressRecord`)
//! - Error types (`StoreError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where used as map keys, for deterministic ordering
//!   in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for counters to prevent overflow

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a registered user.
///
/// Assigned from a monotonically increasing per-store counter at signup;
/// never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Identifier of a course in the external catalog.
///
/// The store treats course ids as opaque strings; the catalog is the
/// authority on which ids exist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

impl CourseId {
    /// Create a new course id from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the course id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from a millisecond count.
    #[must_use]
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the raw millisecond value.
    #[must_use]
    pub const fn millis(self) -> u64 {
        self.0
    }

    /// The later of two timestamps.
    ///
    /// Used to keep `last_accessed` monotonically non-decreasing even if
    /// the wall clock steps backwards between updates.
    #[must_use]
    pub fn later(self, other: Self) -> Self {
        if other.0 > self.0 { other } else { self }
    }
}

// =============================================================================
// USER
// =============================================================================

/// A registered user account.
///
/// Email is the unique login key. The credential is stored as provided at
/// signup and compared in constant time at login; there is no hashing
/// (parity with the browser original — a documented weakness, not a
/// security boundary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The store-assigned user identifier.
    pub id: UserId,
    /// Unique login key.
    pub email: String,
    /// Display name chosen at signup.
    pub name: String,
    /// Opaque login secret.
    pub credential: String,
}

impl User {
    /// Create a new user record.
    #[must_use]
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        name: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            credential: credential.into(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Opaque token bound to an authenticated session.
///
/// Tokens are derived deterministically from the user id and login time.
/// They identify a session; they are not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Issue a token for a user logging in at the given instant.
    #[must_use]
    pub fn issue(user: UserId, at: Timestamp) -> Self {
        Self(format!("tok-{:x}-{:x}", user.0, at.millis()))
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The binding between a store context and an authenticated user.
///
/// At most one session exists per store at a time. Created at
/// login/signup, destroyed at logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The opaque session token.
    pub token: SessionToken,
    /// The authenticated user.
    pub user_id: UserId,
}

impl Session {
    /// Create a session for a user at the given instant.
    #[must_use]
    pub fn open(user: UserId, at: Timestamp) -> Self {
        Self {
            token: SessionToken::issue(user, at),
            user_id: user,
        }
    }
}

// =============================================================================
// PROGRESS
// =============================================================================

/// Per-course playback bookmark for one user.
///
/// Created lazily: a read of a missing record yields the transient
/// default `{ 0, None }` without persisting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressRecord {
    /// Index of the last-viewed video, clamped by the store into
    /// `[0, video_count)`.
    pub current_video: u32,
    /// When the course was last accessed; `None` until the first update.
    pub last_accessed: Option<Timestamp>,
}

impl ProgressRecord {
    /// Create a record at a given video index and access time.
    #[must_use]
    pub const fn at(current_video: u32, last_accessed: Timestamp) -> Self {
        Self {
            current_video,
            last_accessed: Some(last_accessed),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the learnstore store.
///
/// - No silent failures
/// - Use `Result<T, StoreError>` for fallible operations
/// - The store never panics; all errors must be recoverable
/// - A failed operation leaves persisted state unchanged
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Signup attempted with an email that already has an account.
    #[error("An account with this email already exists")]
    DuplicateEmail,

    /// Login failed: unknown email or wrong credential.
    ///
    /// The two cases are deliberately not distinguished, to avoid a
    /// user-enumeration side channel.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A mutation was attempted with no active session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Malformed input rejected at the store boundary.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred in the persistence layer.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
