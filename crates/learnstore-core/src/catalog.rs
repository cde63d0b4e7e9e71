//! # Course Catalog
//!
//! Read-only course records consumed by the store.
//!
//! The catalog is external static data: the store never mutates it, only
//! reads the free-tier flag for entitlement queries and the video count
//! for progress clamping. Catalog JSON uses camelCase keys, matching the
//! front-end's data files.

use crate::primitives::MAX_CATALOG_JSON_SIZE;
use crate::{CourseId, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// COURSE RECORDS
// =============================================================================

/// One video in a course's playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    /// Display title.
    pub title: String,
    /// Playback length in seconds.
    pub duration_secs: u32,
}

/// An immutable course record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Catalog-wide unique id.
    pub id: CourseId,
    /// Display title.
    pub title: String,
    /// Free-tier courses are accessible without an entitlement.
    pub is_free: bool,
    /// Price in minor currency units; 0 for free courses.
    pub price_minor: u32,
    /// Ordered playlist.
    pub videos: Vec<VideoItem>,
}

impl Course {
    /// Number of videos in the playlist.
    ///
    /// This is the bound the store clamps progress indices against.
    #[must_use]
    pub fn video_count(&self) -> u32 {
        u32::try_from(self.videos.len()).unwrap_or(u32::MAX)
    }

    /// Total playlist length in seconds.
    #[must_use]
    pub fn total_duration_secs(&self) -> u64 {
        self.videos
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(u64::from(v.duration_secs)))
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// The immutable set of courses known to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Courses keyed by id, in deterministic order.
    courses: BTreeMap<CourseId, Course>,
}

impl Catalog {
    /// Build a catalog from course records.
    ///
    /// Later records win on duplicate ids, matching the overwrite
    /// semantics used everywhere else in the store.
    #[must_use]
    pub fn new(courses: Vec<Course>) -> Self {
        let courses = courses.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self { courses }
    }

    /// Parse a catalog from a JSON array of course records.
    ///
    /// The document size is validated BEFORE deserialization to prevent
    /// allocation-based exhaustion from corrupted catalog files.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        if json.len() > MAX_CATALOG_JSON_SIZE {
            return Err(StoreError::SerializationError(format!(
                "Catalog document {} bytes exceeds maximum allowed {} bytes",
                json.len(),
                MAX_CATALOG_JSON_SIZE
            )));
        }
        let courses: Vec<Course> = serde_json::from_str(json)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        Ok(Self::new(courses))
    }

    /// Look up a course by id.
    #[must_use]
    pub fn get(&self, id: &CourseId) -> Option<&Course> {
        self.courses.get(id)
    }

    /// Iterate courses in deterministic id order.
    pub fn iter(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// Number of courses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
