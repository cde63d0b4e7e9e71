//! # learnstore-core
//!
//! The session & entitlement store for the learnstore e-learning client.
//!
//! This crate is the single authority for user identity, course
//! entitlements, and playback progress. It replaces the browser
//! original's ambient module-level auth context with an explicit `Store`
//! object over an injected persistence backend.
//!
//! ## Architectural Constraints
//!
//! - Pure synchronous Rust: no async, no network dependencies
//! - Deterministic: `BTreeMap` only, no `HashMap`, no floats; the only
//!   nondeterminism is the injected `Clock`
//! - One active session per store (one browser context)
//! - All failures are values: `Result<T, StoreError>`, never panics
//! - Every persistence write is a full overwrite of one key; a failed
//!   operation leaves persisted state unchanged

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod clock;
pub mod identity;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CourseId, ProgressRecord, Session, SessionToken, StoreError, Timestamp, User, UserId,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use session::{StorageBackend, Store, UserIdentity};
pub use storage::RedbStore;
pub use store::{MemoryStore, StateStore};

// =============================================================================
// RE-EXPORTS: Collaborators
// =============================================================================

pub use catalog::{Catalog, Course, VideoItem};
pub use clock::{Clock, SystemClock};
pub use identity::display_name;
