//! # Persistence Port
//!
//! The `StateStore` trait defines the key-value persistence operations
//! the store needs, and `MemoryStore` implements them in memory.
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic
//! ordering. All fallible operations return `Result<T, StoreError>` so
//! in-memory and disk-backed backends are interchangeable.
//!
//! ## Atomicity
//!
//! Every write is a full overwrite of exactly one logical key (one
//! user's entitlement set, one user's progress map, the single session
//! record). There are no partial writes: a failed operation leaves
//! persisted state unchanged.

use crate::{CourseId, ProgressRecord, Session, StoreError, User, UserId};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STATESTORE TRAIT
// =============================================================================

/// The persistence operations behind the session & entitlement store.
///
/// Keys are namespaced by `UserId` so no record of one user is reachable
/// through another user's id.
pub trait StateStore {
    /// Create a user with the next available id.
    ///
    /// Returns the stored record. Fails with `DuplicateEmail` if the
    /// email is already registered; in that case nothing is written.
    fn insert_user(
        &mut self,
        name: &str,
        email: &str,
        credential: &str,
    ) -> Result<User, StoreError>;

    /// Look up a user by email (the login key).
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up a user by id.
    fn lookup_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Total number of registered users.
    fn user_count(&self) -> Result<usize, StoreError>;

    /// Load the session record, if one is persisted.
    fn load_session(&self) -> Result<Option<Session>, StoreError>;

    /// Persist the session record, replacing any previous one.
    fn save_session(&mut self, session: &Session) -> Result<(), StoreError>;

    /// Remove the session record. Removing an absent record is not an error.
    fn clear_session(&mut self) -> Result<(), StoreError>;

    /// Load a user's entitlement set. Absent records read as empty.
    fn load_entitlements(&self, user: UserId) -> Result<BTreeSet<CourseId>, StoreError>;

    /// Persist a user's entitlement set as a full overwrite.
    fn save_entitlements(
        &mut self,
        user: UserId,
        owned: &BTreeSet<CourseId>,
    ) -> Result<(), StoreError>;

    /// Load a user's progress map. Absent records read as empty.
    fn load_progress(&self, user: UserId)
    -> Result<BTreeMap<CourseId, ProgressRecord>, StoreError>;

    /// Persist a user's progress map as a full overwrite.
    fn save_progress(
        &mut self,
        user: UserId,
        progress: &BTreeMap<CourseId, ProgressRecord>,
    ) -> Result<(), StoreError>;
}

// =============================================================================
// MEMORYSTORE IMPLEMENTATION
// =============================================================================

/// In-memory `StateStore`.
///
/// Fast and volatile: state lives only as long as the value. Useful on
/// its own for tests, and as the backing of short-lived store instances.
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// User records: UserId -> User
    users: BTreeMap<UserId, User>,

    /// Reverse lookup: email -> UserId
    email_index: BTreeMap<String, UserId>,

    /// The single session record, if any.
    session: Option<Session>,

    /// Entitlement sets: UserId -> owned course ids
    entitlements: BTreeMap<UserId, BTreeSet<CourseId>>,

    /// Progress maps: UserId -> (CourseId -> ProgressRecord)
    progress: BTreeMap<UserId, BTreeMap<CourseId, ProgressRecord>>,

    /// Next available UserId
    next_user_id: u64,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn insert_user(
        &mut self,
        name: &str,
        email: &str,
        credential: &str,
    ) -> Result<User, StoreError> {
        if self.email_index.contains_key(email) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = UserId(self.next_user_id);
        self.next_user_id = self.next_user_id.saturating_add(1);

        let user = User::new(id, email, name, credential);
        self.users.insert(id, user.clone());
        self.email_index.insert(email.to_string(), id);

        Ok(user)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let id = self.email_index.get(email);
        Ok(id.and_then(|id| self.users.get(id)).cloned())
    }

    fn lookup_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_count(&self) -> Result<usize, StoreError> {
        Ok(self.users.len())
    }

    fn load_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.session.clone())
    }

    fn save_session(&mut self, session: &Session) -> Result<(), StoreError> {
        self.session = Some(session.clone());
        Ok(())
    }

    fn clear_session(&mut self) -> Result<(), StoreError> {
        self.session = None;
        Ok(())
    }

    fn load_entitlements(&self, user: UserId) -> Result<BTreeSet<CourseId>, StoreError> {
        Ok(self.entitlements.get(&user).cloned().unwrap_or_default())
    }

    fn save_entitlements(
        &mut self,
        user: UserId,
        owned: &BTreeSet<CourseId>,
    ) -> Result<(), StoreError> {
        self.entitlements.insert(user, owned.clone());
        Ok(())
    }

    fn load_progress(
        &self,
        user: UserId,
    ) -> Result<BTreeMap<CourseId, ProgressRecord>, StoreError> {
        Ok(self.progress.get(&user).cloned().unwrap_or_default())
    }

    fn save_progress(
        &mut self,
        user: UserId,
        progress: &BTreeMap<CourseId, ProgressRecord>,
    ) -> Result<(), StoreError> {
        self.progress.insert(user, progress.clone());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    #[test]
    fn insert_user_assigns_sequential_ids() {
        let mut store = MemoryStore::new();

        let ada = store.insert_user("Ada", "ada@example.com", "pw123").expect("insert");
        let bob = store.insert_user("Bob", "bob@example.com", "pw456").expect("insert");

        assert_eq!(ada.id, UserId(0));
        assert_eq!(bob.id, UserId(1));
        assert_eq!(store.user_count().expect("count"), 2);
    }

    #[test]
    fn duplicate_email_rejected_without_side_effects() {
        let mut store = MemoryStore::new();
        store.insert_user("Ada", "ada@example.com", "pw123").expect("insert");

        let result = store.insert_user("Imposter", "ada@example.com", "other");

        assert_eq!(result, Err(StoreError::DuplicateEmail));
        assert_eq!(store.user_count().expect("count"), 1);
        let stored = store
            .find_user_by_email("ada@example.com")
            .expect("find")
            .expect("present");
        assert_eq!(stored.name, "Ada");
    }

    #[test]
    fn absent_records_read_as_empty_defaults() {
        let store = MemoryStore::new();
        let ghost = UserId(99);

        assert!(store.load_entitlements(ghost).expect("load").is_empty());
        assert!(store.load_progress(ghost).expect("load").is_empty());
        assert_eq!(store.load_session().expect("load"), None);
    }

    #[test]
    fn entitlements_are_namespaced_by_user() {
        let mut store = MemoryStore::new();
        let ada = store.insert_user("Ada", "ada@example.com", "pw123").expect("insert");
        let bob = store.insert_user("Bob", "bob@example.com", "pw456").expect("insert");

        let mut owned = BTreeSet::new();
        owned.insert(CourseId::new("course-1"));
        store.save_entitlements(ada.id, &owned).expect("save");

        assert_eq!(store.load_entitlements(ada.id).expect("load").len(), 1);
        assert!(store.load_entitlements(bob.id).expect("load").is_empty());
    }

    #[test]
    fn save_overwrites_whole_record() {
        let mut store = MemoryStore::new();
        let ada = store.insert_user("Ada", "ada@example.com", "pw123").expect("insert");

        let mut progress = BTreeMap::new();
        progress.insert(
            CourseId::new("course-1"),
            ProgressRecord::at(3, Timestamp::new(1000)),
        );
        store.save_progress(ada.id, &progress).expect("save");

        // A later overwrite with a smaller map wins outright.
        store.save_progress(ada.id, &BTreeMap::new()).expect("save");
        assert!(store.load_progress(ada.id).expect("load").is_empty());
    }

    #[test]
    fn clear_session_is_idempotent() {
        let mut store = MemoryStore::new();
        let ada = store.insert_user("Ada", "ada@example.com", "pw123").expect("insert");

        let session = Session::open(ada.id, Timestamp::new(5));
        store.save_session(&session).expect("save");
        assert!(store.load_session().expect("load").is_some());

        store.clear_session().expect("clear");
        store.clear_session().expect("clear again");
        assert_eq!(store.load_session().expect("load"), None);
    }
}
