//! # Session & Entitlement Store
//!
//! The high-level store combining a persistence backend with the
//! volatile per-session caches.
//!
//! One `Store` serves one browser context:
//! - At most one active session at a time
//! - `ANONYMOUS -> (signup | login) -> AUTHENTICATED -> logout -> ANONYMOUS`
//! - Mutations in `ANONYMOUS` fail with `NotAuthenticated` and touch
//!   no persisted state
//!
//! ## Storage Backends
//!
//! The store supports two backends:
//! - `InMemory`: uses `MemoryStore` (fast, volatile)
//! - `Persistent`: uses `RedbStore` for disk-backed ACID storage
//!
//! The entitlement set and progress map of the signed-in user are cached
//! in the store and written through on every mutation; caches are
//! updated only after a successful persist.

use crate::catalog::Course;
use crate::clock::{Clock, SystemClock};
use crate::identity;
use crate::storage::RedbStore;
use crate::store::{MemoryStore, StateStore};
use crate::{CourseId, ProgressRecord, Session, StoreError, UserId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a `Store`.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory state (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed state using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

// =============================================================================
// ACTIVE SESSION
// =============================================================================

/// Display identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// The user's id.
    pub id: UserId,
    /// Display name chosen at signup.
    pub name: String,
    /// Login email.
    pub email: String,
}

/// Volatile state of the authenticated user.
///
/// Never persisted as a unit; each field mirrors exactly one persisted
/// key and is rebuilt from disk at login or session restore.
#[derive(Debug, Clone)]
struct ActiveSession {
    session: Session,
    identity: UserIdentity,
    entitlements: BTreeSet<CourseId>,
    progress: BTreeMap<CourseId, ProgressRecord>,
}

// =============================================================================
// STORE
// =============================================================================

/// The session & entitlement store.
///
/// Single authority for identity, course entitlements, and playback
/// progress. Construct one per process and pass it by reference to
/// consumers; there is no ambient global.
#[derive(Debug)]
pub struct Store {
    /// The storage backend (in-memory or persistent).
    backend: StorageBackend,
    /// Injected time source for tokens and access stamps.
    clock: Box<dyn Clock>,
    /// The signed-in user's volatile state, if any.
    active: Option<ActiveSession>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: StorageBackend::default(),
            clock: Box::new(SystemClock),
            active: None,
        }
    }

    /// Create a store over an existing backend.
    ///
    /// If the backend holds a persisted session (the browser original's
    /// "already logged in on page load" case), the active caches are
    /// rehydrated from it.
    pub fn with_backend(backend: StorageBackend) -> Result<Self, StoreError> {
        let mut store = Self {
            backend,
            clock: Box::new(SystemClock),
            active: None,
        };
        store.restore_active()?;
        Ok(store)
    }

    /// Create a store with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path and restores
    /// any persisted session.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let redb = RedbStore::open(path)?;
        Self::with_backend(StorageBackend::Persistent(redb))
    }

    /// Replace the clock. Intended for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    fn state(&self) -> &dyn StateStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn state_mut(&mut self) -> &mut dyn StateStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    /// Rehydrate the active caches from a persisted session record.
    fn restore_active(&mut self) -> Result<(), StoreError> {
        let Some(session) = self.state().load_session()? else {
            return Ok(());
        };
        let Some(user) = self.state().lookup_user(session.user_id)? else {
            // Stale session pointing at a missing user record
            self.state_mut().clear_session()?;
            return Ok(());
        };

        let entitlements = self.state().load_entitlements(user.id)?;
        let progress = self.state().load_progress(user.id)?;
        self.active = Some(ActiveSession {
            session,
            identity: UserIdentity {
                id: user.id,
                name: user.name,
                email: user.email,
            },
            entitlements,
            progress,
        });
        Ok(())
    }

    // =========================================================================
    // AUTHENTICATION
    // =========================================================================

    /// Register a new account and log it in.
    ///
    /// Creates the user record, an empty entitlement set, and an empty
    /// progress map, then opens a session. Fails with `Validation` for
    /// malformed input and `DuplicateEmail` for a registered email; in
    /// both cases nothing is persisted.
    pub fn signup(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, StoreError> {
        identity::validate_signup(name, email, password)?;

        let user = self.state_mut().insert_user(name, email, password)?;
        self.state_mut().save_entitlements(user.id, &BTreeSet::new())?;
        self.state_mut().save_progress(user.id, &BTreeMap::new())?;

        let session = Session::open(user.id, self.clock.now());
        self.state_mut().save_session(&session)?;

        self.active = Some(ActiveSession {
            session: session.clone(),
            identity: UserIdentity {
                id: user.id,
                name: user.name,
                email: user.email,
            },
            entitlements: BTreeSet::new(),
            progress: BTreeMap::new(),
        });
        Ok(session)
    }

    /// Log in with email and credential.
    ///
    /// Unknown email and wrong credential both fail with
    /// `InvalidCredentials`; the cases are not distinguishable from the
    /// outside. On success the user's persisted entitlements and
    /// progress are loaded into the active caches.
    pub fn login(&mut self, email: &str, password: &str) -> Result<Session, StoreError> {
        let Some(user) = self.state().find_user_by_email(email)? else {
            return Err(StoreError::InvalidCredentials);
        };
        if !identity::verify_credential(&user.credential, password) {
            return Err(StoreError::InvalidCredentials);
        }

        let entitlements = self.state().load_entitlements(user.id)?;
        let progress = self.state().load_progress(user.id)?;

        let session = Session::open(user.id, self.clock.now());
        self.state_mut().save_session(&session)?;

        self.active = Some(ActiveSession {
            session: session.clone(),
            identity: UserIdentity {
                id: user.id,
                name: user.name,
                email: user.email,
            },
            entitlements,
            progress,
        });
        Ok(session)
    }

    /// End the active session.
    ///
    /// Clears the session record and the volatile caches; the user's
    /// persisted entitlement and progress records are untouched. Logging
    /// out while anonymous is a no-op.
    pub fn logout(&mut self) -> Result<(), StoreError> {
        self.active = None;
        self.state_mut().clear_session()
    }

    // =========================================================================
    // ENTITLEMENTS
    // =========================================================================

    /// Record a course purchase for the signed-in user.
    ///
    /// Idempotent: purchasing an owned course changes nothing. Fails
    /// with `NotAuthenticated` when anonymous.
    pub fn purchase_course(&mut self, course: &CourseId) -> Result<(), StoreError> {
        let Some(active) = self.active.as_ref() else {
            return Err(StoreError::NotAuthenticated);
        };
        identity::validate_course_id(course)?;

        if active.entitlements.contains(course) {
            return Ok(());
        }

        let user_id = active.identity.id;
        let mut owned = active.entitlements.clone();
        owned.insert(course.clone());
        self.state_mut().save_entitlements(user_id, &owned)?;

        // Cache commits only after a successful persist
        if let Some(active) = self.active.as_mut() {
            active.entitlements = owned;
        }
        Ok(())
    }

    /// Whether the signed-in user may access a course.
    ///
    /// Pure query: free courses always pass; otherwise the course must
    /// be in the active entitlement set. Anonymous callers only reach
    /// free courses.
    #[must_use]
    pub fn has_entitlement(&self, course: &CourseId, is_free: bool) -> bool {
        if is_free {
            return true;
        }
        self.active
            .as_ref()
            .is_some_and(|active| active.entitlements.contains(course))
    }

    /// `has_entitlement` with the free flag read from a catalog record.
    #[must_use]
    pub fn has_course_access(&self, course: &Course) -> bool {
        self.has_entitlement(&course.id, course.is_free)
    }

    /// The signed-in user's owned courses, in deterministic order.
    #[must_use]
    pub fn owned_courses(&self) -> Vec<CourseId> {
        self.active
            .as_ref()
            .map(|active| active.entitlements.iter().cloned().collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // PROGRESS
    // =========================================================================

    /// Record the playback position for a course.
    ///
    /// The index is clamped into `[0, video_count)` (0 when the course
    /// has no videos) rather than trusting the caller. Stamps
    /// `last_accessed` with the current time, kept monotonically
    /// non-decreasing per record. Fails with `NotAuthenticated` when
    /// anonymous.
    pub fn update_progress(
        &mut self,
        course: &CourseId,
        video_index: u32,
        video_count: u32,
    ) -> Result<(), StoreError> {
        let Some(active) = self.active.as_ref() else {
            return Err(StoreError::NotAuthenticated);
        };
        identity::validate_course_id(course)?;

        let clamped = if video_count == 0 {
            0
        } else {
            video_index.min(video_count.saturating_sub(1))
        };

        let now = self.clock.now();
        let previous = active.progress.get(course).copied().unwrap_or_default();
        let stamped = previous.last_accessed.map_or(now, |prev| prev.later(now));

        let user_id = active.identity.id;
        let mut progress = active.progress.clone();
        progress.insert(course.clone(), ProgressRecord::at(clamped, stamped));
        self.state_mut().save_progress(user_id, &progress)?;

        if let Some(active) = self.active.as_mut() {
            active.progress = progress;
        }
        Ok(())
    }

    /// The playback bookmark for a course.
    ///
    /// Returns the stored record, or the transient default
    /// `{ 0, None }` if none exists. Reading never creates a persisted
    /// record.
    #[must_use]
    pub fn get_progress(&self, course: &CourseId) -> ProgressRecord {
        self.active
            .as_ref()
            .and_then(|active| active.progress.get(course).copied())
            .unwrap_or_default()
    }

    // =========================================================================
    // IDENTITY QUERIES
    // =========================================================================

    /// Whether a session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }

    /// The active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|active| &active.session)
    }

    /// The signed-in user's identity, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.active.as_ref().map(|active| active.identity.clone())
    }

    /// Display name through the fallback chain; `"User"` when anonymous.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.active.as_ref() {
            Some(active) => identity::display_name(
                Some(&active.identity.name),
                Some(&active.identity.email),
            ),
            None => identity::display_name(None, None),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use std::cell::Cell;

    #[derive(Debug)]
    struct ManualClock(Cell<u64>);

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0.get())
        }
    }

    #[test]
    fn starts_anonymous() {
        let store = Store::new();
        assert!(!store.is_authenticated());
        assert_eq!(store.session(), None);
        assert_eq!(store.current_user(), None);
        assert_eq!(store.display_name(), "User");
    }

    #[test]
    fn signup_authenticates() {
        let mut store = Store::new();
        let session = store.signup("Ada", "ada@example.com", "pw123").expect("signup");

        assert!(store.is_authenticated());
        assert_eq!(store.session(), Some(&session));
        assert_eq!(store.display_name(), "Ada");

        let user = store.current_user().expect("user");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(session.user_id, user.id);
    }

    #[test]
    fn logout_returns_to_anonymous() {
        let mut store = Store::new();
        store.signup("Ada", "ada@example.com", "pw123").expect("signup");

        store.logout().expect("logout");
        assert!(!store.is_authenticated());

        // Mutations now fail again
        let result = store.purchase_course(&CourseId::new("course-1"));
        assert_eq!(result, Err(StoreError::NotAuthenticated));
    }

    #[test]
    fn anonymous_mutations_rejected() {
        let mut store = Store::new();

        let purchase = store.purchase_course(&CourseId::new("course-1"));
        assert_eq!(purchase, Err(StoreError::NotAuthenticated));

        let progress = store.update_progress(&CourseId::new("course-1"), 2, 10);
        assert_eq!(progress, Err(StoreError::NotAuthenticated));
    }

    #[test]
    fn session_token_reflects_clock() {
        let mut store = Store::new().with_clock(Box::new(ManualClock(Cell::new(0x1000))));
        let session = store.signup("Ada", "ada@example.com", "pw123").expect("signup");

        assert_eq!(session.token.as_str(), "tok-0-1000");
    }

    #[test]
    fn progress_clamped_to_playlist() {
        let mut store = Store::new();
        store.signup("Ada", "ada@example.com", "pw123").expect("signup");
        let course = CourseId::new("course-1");

        store.update_progress(&course, 99, 4).expect("update");
        assert_eq!(store.get_progress(&course).current_video, 3);

        store.update_progress(&course, 2, 4).expect("update");
        assert_eq!(store.get_progress(&course).current_video, 2);

        // Empty playlist pins the index at zero
        store.update_progress(&course, 7, 0).expect("update");
        assert_eq!(store.get_progress(&course).current_video, 0);
    }

    #[test]
    fn get_progress_default_is_transient() {
        let mut store = Store::new();
        store.signup("Ada", "ada@example.com", "pw123").expect("signup");
        let course = CourseId::new("course-1");

        let record = store.get_progress(&course);
        assert_eq!(record, ProgressRecord::default());

        // The read did not create a persisted record
        let user = store.current_user().expect("user");
        let StorageBackend::InMemory(memory) = store.backend() else {
            unreachable!("test uses in-memory backend");
        };
        use crate::store::StateStore as _;
        assert!(memory.load_progress(user.id).expect("load").is_empty());
    }
}
