//! # Persistent Storage
//!
//! Disk-backed `StateStore` implementation over the redb embedded
//! database.

mod redb_store;

pub use redb_store::RedbStore;
