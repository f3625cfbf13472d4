//! Shared primitive types for storage areas and history records.

use serde::{Deserialize, Serialize};

/// Monotonic storage write sequence number.
pub type OpSeq = u64;

/// One of the two fixed storage areas.
///
/// `Local` is device-specific and holds the full option set. `Sync` is
/// propagated by the platform across a user's devices, eventually consistent,
/// and only ever holds sync-eligible options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Device-local storage.
    Local,
    /// Cross-device synchronized storage.
    Sync,
}

impl StorageArea {
    /// Returns the opposite area.
    pub fn other(self) -> Self {
        match self {
            Self::Local => Self::Sync,
            Self::Sync => Self::Local,
        }
    }

    /// Stable storage tag used by persistence backends.
    pub fn tag(self) -> u8 {
        match self {
            Self::Local => 0,
            Self::Sync => 1,
        }
    }

    /// Inverse of [`StorageArea::tag`]; `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Local),
            1 => Some(Self::Sync),
            _ => None,
        }
    }
}

/// A single cataloged DOI.
///
/// Identity is the `doi` string, case-sensitive and unique within the
/// history collection. `title` is empty until discovered; `save` pins the
/// entry against eviction when the collection is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The DOI string, e.g. `10.1000/xyz123`.
    pub doi: String,
    /// Resolved title, empty when unknown.
    #[serde(default)]
    pub title: String,
    /// True when the user pinned this entry.
    #[serde(default)]
    pub save: bool,
}

impl HistoryEntry {
    /// Constructs an unsaved entry with an optional title.
    pub fn new(doi: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            title: title.into(),
            save: false,
        }
    }
}
