//! # redb-backed State Storage
//!
//! A disk-backed `StateStore` using the redb embedded database.
//!
//! This is the durable persistence layer required by the store: state
//! survives process restart the way the browser original's records
//! survived a page reload. redb provides:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Key layout
//!
//! - `users`: UserId(u64) -> postcard-serialized User
//! - `email_index`: email -> UserId(u64)
//! - `session`: "current" -> postcard-serialized Session (at most one row)
//! - `entitlements`: UserId(u64) -> postcard-serialized BTreeSet<CourseId>
//! - `progress`: UserId(u64) -> postcard-serialized BTreeMap<CourseId, ProgressRecord>
//! - `metadata`: key string -> value u64
//!
//! Every write is an unconditional overwrite of one key, so concurrent
//! store contexts sharing a database resolve conflicts last-write-wins.

use crate::primitives::{META_NEXT_USER_ID, SESSION_KEY};
use crate::store::StateStore;
use crate::{CourseId, ProgressRecord, Session, StoreError, User, UserId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Table for users: UserId(u64) -> serialized User bytes
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Table for the email index: email -> UserId(u64)
const EMAIL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("email_index");

/// Table for the session record: key string -> serialized Session bytes
const SESSION: TableDefinition<&str, &[u8]> = TableDefinition::new("session");

/// Table for entitlement sets: UserId(u64) -> serialized set bytes
const ENTITLEMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("entitlements");

/// Table for progress maps: UserId(u64) -> serialized map bytes
const PROGRESS: TableDefinition<u64, &[u8]> = TableDefinition::new("progress");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed state store using redb.
///
/// Maintains an in-memory email index for fast duplicate checks; the
/// index is rebuilt from disk at `open()` and updated only after a
/// successful commit.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// In-memory cache of email -> user id.
    email_cache: BTreeMap<String, UserId>,
    /// Next available user id.
    next_user_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("email_cache_size", &self.email_cache.len())
            .field("next_user_id", &self.next_user_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a state database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| StoreError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(USERS)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(EMAIL_INDEX)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(SESSION)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(ENTITLEMENTS)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(PROGRESS)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }

        // Load metadata
        let read_txn = db
            .begin_read()
            .map_err(|e| StoreError::IoError(e.to_string()))?;

        let next_user_id = {
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            table
                .get(META_NEXT_USER_ID)
                .map_err(|e| StoreError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        // Load email cache
        let email_cache = {
            let table = read_txn
                .open_table(EMAIL_INDEX)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let mut cache = BTreeMap::new();
            for entry in table
                .iter()
                .map_err(|e| StoreError::IoError(e.to_string()))?
            {
                let (key, value) = entry.map_err(|e| StoreError::IoError(e.to_string()))?;
                cache.insert(key.value().to_string(), UserId(value.value()));
            }
            cache
        };

        Ok(Self {
            db,
            email_cache,
            next_user_id,
        })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), StoreError> {
        self.db
            .compact()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Read one value table row keyed by user id and deserialize it.
    fn load_user_record<T>(
        &self,
        table_def: TableDefinition<'static, u64, &'static [u8]>,
        user: UserId,
    ) -> Result<Option<T>, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(table_def)
            .map_err(|e| StoreError::IoError(e.to_string()))?;

        match table
            .get(user.0)
            .map_err(|e| StoreError::IoError(e.to_string()))?
        {
            Some(data) => {
                let record = postcard::from_bytes(data.value())
                    .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Overwrite one value table row keyed by user id.
    fn save_user_record<T>(
        &mut self,
        table_def: TableDefinition<'static, u64, &'static [u8]>,
        user: UserId,
        record: &T,
    ) -> Result<(), StoreError>
    where
        T: serde::Serialize,
    {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(table_def)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            table
                .insert(user.0, bytes.as_slice())
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// STATESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl StateStore for RedbStore {
    fn insert_user(
        &mut self,
        name: &str,
        email: &str,
        credential: &str,
    ) -> Result<User, StoreError> {
        // Duplicate check against the in-memory index before any write
        if self.email_cache.contains_key(email) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = UserId(self.next_user_id);
        let next_user_id = self.next_user_id.saturating_add(1);

        let user = User::new(id, email, name, credential);
        let user_bytes = postcard::to_allocvec(&user)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        // User record, email index, and id counter commit atomically
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        {
            let mut users_table = write_txn
                .open_table(USERS)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            users_table
                .insert(id.0, user_bytes.as_slice())
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        {
            let mut email_table = write_txn
                .open_table(EMAIL_INDEX)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            email_table
                .insert(email, id.0)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        {
            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            meta_table
                .insert(META_NEXT_USER_ID, next_user_id)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::IoError(e.to_string()))?;

        // Update in-memory state only after successful commit
        self.next_user_id = next_user_id;
        self.email_cache.insert(email.to_string(), id);

        Ok(user)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match self.email_cache.get(email) {
            Some(&id) => self.lookup_user(id),
            None => Ok(None),
        }
    }

    fn lookup_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.load_user_record(USERS, id)
    }

    fn user_count(&self) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let users_table = read_txn
            .open_table(USERS)
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let len = users_table
            .len()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn load_session(&self) -> Result<Option<Session>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let session_table = read_txn
            .open_table(SESSION)
            .map_err(|e| StoreError::IoError(e.to_string()))?;

        match session_table
            .get(SESSION_KEY)
            .map_err(|e| StoreError::IoError(e.to_string()))?
        {
            Some(data) => {
                let session: Session = postcard::from_bytes(data.value())
                    .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn save_session(&mut self, session: &Session) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(session)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        {
            let mut session_table = write_txn
                .open_table(SESSION)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            session_table
                .insert(SESSION_KEY, bytes.as_slice())
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }

    fn clear_session(&mut self) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        {
            let mut session_table = write_txn
                .open_table(SESSION)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            let _ = session_table
                .remove(SESSION_KEY)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }

    fn load_entitlements(&self, user: UserId) -> Result<BTreeSet<CourseId>, StoreError> {
        Ok(self
            .load_user_record(ENTITLEMENTS, user)?
            .unwrap_or_default())
    }

    fn save_entitlements(
        &mut self,
        user: UserId,
        owned: &BTreeSet<CourseId>,
    ) -> Result<(), StoreError> {
        self.save_user_record(ENTITLEMENTS, user, owned)
    }

    fn load_progress(
        &self,
        user: UserId,
    ) -> Result<BTreeMap<CourseId, ProgressRecord>, StoreError> {
        Ok(self.load_user_record(PROGRESS, user)?.unwrap_or_default())
    }

    fn save_progress(
        &mut self,
        user: UserId,
        progress: &BTreeMap<CourseId, ProgressRecord>,
    ) -> Result<(), StoreError> {
        self.save_user_record(PROGRESS, user, progress)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.redb");
        (dir, path)
    }

    #[test]
    fn users_survive_reopen() {
        let (_dir, path) = temp_db();

        {
            let mut store = RedbStore::open(&path).expect("open");
            store
                .insert_user("Ada", "ada@example.com", "pw123")
                .expect("insert");
        }

        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(store.user_count().expect("count"), 1);
        let ada = store
            .find_user_by_email("ada@example.com")
            .expect("find")
            .expect("present");
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.id, UserId(0));
    }

    #[test]
    fn id_counter_survives_reopen() {
        let (_dir, path) = temp_db();

        {
            let mut store = RedbStore::open(&path).expect("open");
            store
                .insert_user("Ada", "ada@example.com", "pw123")
                .expect("insert");
        }

        let mut store = RedbStore::open(&path).expect("reopen");
        let bob = store
            .insert_user("Bob", "bob@example.com", "pw456")
            .expect("insert");

        // Ids must not be reused across restarts
        assert_eq!(bob.id, UserId(1));
    }

    #[test]
    fn duplicate_email_rejected_after_reopen() {
        let (_dir, path) = temp_db();

        {
            let mut store = RedbStore::open(&path).expect("open");
            store
                .insert_user("Ada", "ada@example.com", "pw123")
                .expect("insert");
        }

        let mut store = RedbStore::open(&path).expect("reopen");
        let result = store.insert_user("Imposter", "ada@example.com", "other");
        assert_eq!(result, Err(StoreError::DuplicateEmail));
    }

    #[test]
    fn session_record_roundtrip() {
        let (_dir, path) = temp_db();
        let mut store = RedbStore::open(&path).expect("open");

        let session = Session::open(UserId(3), Timestamp::new(42));
        store.save_session(&session).expect("save");
        assert_eq!(store.load_session().expect("load"), Some(session));

        store.clear_session().expect("clear");
        assert_eq!(store.load_session().expect("load"), None);
        // Clearing an absent record is not an error
        store.clear_session().expect("clear again");
    }

    #[test]
    fn entitlements_and_progress_survive_reopen() {
        let (_dir, path) = temp_db();
        let ada = UserId(0);

        {
            let mut store = RedbStore::open(&path).expect("open");
            store
                .insert_user("Ada", "ada@example.com", "pw123")
                .expect("insert");

            let mut owned = BTreeSet::new();
            owned.insert(CourseId::new("course-1"));
            store.save_entitlements(ada, &owned).expect("save");

            let mut progress = BTreeMap::new();
            progress.insert(
                CourseId::new("course-1"),
                ProgressRecord::at(3, Timestamp::new(1000)),
            );
            store.save_progress(ada, &progress).expect("save");
        }

        let store = RedbStore::open(&path).expect("reopen");
        let owned = store.load_entitlements(ada).expect("load");
        assert!(owned.contains(&CourseId::new("course-1")));

        let progress = store.load_progress(ada).expect("load");
        let record = progress.get(&CourseId::new("course-1")).expect("record");
        assert_eq!(record.current_video, 3);
        assert_eq!(record.last_accessed, Some(Timestamp::new(1000)));
    }
}
