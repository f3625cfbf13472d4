//! Bounded history log over the settings store.
//!
//! The collection lives in `recorded_dois`, capped by `history_length`.
//! Saved entries are pinned: eviction only ever removes the oldest unsaved
//! entry, and an insertion is rejected outright when every entry is pinned.
//! A collection already larger than the cap is a sentinel state (the user
//! lowered the cap below the count); recording aborts until entries are
//! deleted, the log is never truncated behind the user's back.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::options::HistorySort;
use crate::options::patch::OptionsPatch;
use crate::storage::SettingsStore;
use crate::types::{HistoryEntry, StorageArea};

/// How one [`record`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The history option is off; nothing was touched.
    Disabled,
    /// The collection exceeds the cap; recording is suspended until the
    /// user deletes entries.
    Oversized,
    /// The DOI already existed and the supplied title was written over it.
    TitleUpdated,
    /// The DOI already existed; nothing changed.
    Unchanged { needs_title: bool },
    /// The collection is full of pinned entries; the DOI was not added.
    RejectedFull,
    /// A new entry was appended.
    Recorded { needs_title: bool },
}

impl RecordOutcome {
    /// Whether the caller should schedule an asynchronous title fetch.
    pub fn needs_title(self) -> bool {
        matches!(
            self,
            RecordOutcome::Unchanged { needs_title: true }
                | RecordOutcome::Recorded { needs_title: true }
        )
    }

    /// Whether the DOI is present in the collection after the call.
    pub fn present(self) -> bool {
        matches!(
            self,
            RecordOutcome::TitleUpdated
                | RecordOutcome::Unchanged { .. }
                | RecordOutcome::Recorded { .. }
        )
    }
}

/// Resolves a DOI to a human-readable title. Fails soft: any error is
/// `None` and never blocks recording.
#[async_trait]
pub trait TitleSource: Send + Sync {
    async fn fetch_title(&self, doi: &str) -> Option<String>;
}

/// A source that never finds a title.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTitles;

#[async_trait]
impl TitleSource for NoTitles {
    async fn fetch_title(&self, _doi: &str) -> Option<String> {
        None
    }
}

/// Records one DOI into the history collection.
///
/// `title` overwrites an existing entry's title unconditionally when given.
/// When absent, `allow_fetch` decides whether the outcome may ask the
/// caller for an asynchronous fetch (gated further by the
/// `history_fetch_title` option).
pub fn record(
    store: &mut SettingsStore,
    doi: &str,
    title: Option<&str>,
    allow_fetch: bool,
) -> RecordOutcome {
    let opts = store.options();
    if !opts.history {
        return RecordOutcome::Disabled;
    }

    let cap = opts.history_length as usize;
    let mut entries = opts.recorded_dois;
    if entries.len() > cap {
        warn!(
            count = entries.len(),
            cap, "history log exceeds its cap; not recording"
        );
        return RecordOutcome::Oversized;
    }

    let fetch_wanted = allow_fetch && opts.history_fetch_title;

    if let Some(pos) = entries.iter().position(|e| e.doi == doi) {
        return match title {
            Some(t) => {
                entries[pos].title = t.to_string();
                write_entries(store, entries);
                RecordOutcome::TitleUpdated
            }
            None => RecordOutcome::Unchanged {
                needs_title: fetch_wanted && entries[pos].title.is_empty(),
            },
        };
    }

    if entries.len() == cap {
        match entries.iter().position(|e| !e.save) {
            Some(oldest) => {
                let evicted = entries.remove(oldest);
                debug!(doi = %evicted.doi, "evicted oldest unsaved history entry");
            }
            None => {
                debug!(%doi, "history full of saved entries; rejecting");
                return RecordOutcome::RejectedFull;
            }
        }
    }

    let needs_title = title.is_none() && fetch_wanted;
    entries.push(HistoryEntry::new(doi, title.unwrap_or_default()));
    write_entries(store, entries);
    RecordOutcome::Recorded { needs_title }
}

/// Appends a DOI to the pending queue without recording it. Returns false
/// when history is disabled.
pub fn queue(store: &mut SettingsStore, doi: &str) -> bool {
    let opts = store.options();
    if !opts.history {
        return false;
    }
    let mut pending = opts.history_doi_queue;
    pending.push(doi.to_string());
    write_queue(store, pending);
    true
}

/// Empties the pending queue and returns its contents.
///
/// The queue is swapped for an empty one before anything else happens, so
/// enqueues racing with the drain land in the fresh queue instead of being
/// lost.
pub fn drain_queue(store: &mut SettingsStore) -> Vec<String> {
    let opts = store.options();
    if opts.history_doi_queue.is_empty() {
        return Vec::new();
    }
    write_queue(store, Vec::new());
    opts.history_doi_queue
}

/// Writes a fetched title onto an existing entry. Returns false when the
/// entry is gone or already carries that title.
pub fn patch_title(store: &mut SettingsStore, doi: &str, title: &str) -> bool {
    let mut entries = store.options().recorded_dois;
    let Some(entry) = entries.iter_mut().find(|e| e.doi == doi) else {
        return false;
    };
    if entry.title == title {
        return false;
    }
    entry.title = title.to_string();
    write_entries(store, entries);
    true
}

/// Pins or unpins an entry. Returns false when the entry does not exist.
pub fn set_saved(store: &mut SettingsStore, doi: &str, saved: bool) -> bool {
    let mut entries = store.options().recorded_dois;
    let Some(entry) = entries.iter_mut().find(|e| e.doi == doi) else {
        return false;
    };
    if entry.save == saved {
        return false;
    }
    entry.save = saved;
    write_entries(store, entries);
    true
}

/// Removes an entry, pinned or not. Returns false when absent.
pub fn delete(store: &mut SettingsStore, doi: &str) -> bool {
    let mut entries = store.options().recorded_dois;
    let Some(pos) = entries.iter().position(|e| e.doi == doi) else {
        return false;
    };
    entries.remove(pos);
    write_entries(store, entries);
    true
}

/// Removes every entry, pinned ones included. Pinning protects against
/// eviction, not against an explicit wipe. Returns how many were removed.
pub fn clear(store: &mut SettingsStore) -> usize {
    let entries = store.options().recorded_dois;
    let count = entries.len();
    if count > 0 {
        write_entries(store, Vec::new());
    }
    count
}

/// The collection ordered per the `history_sortby` option.
pub fn entries(store: &SettingsStore) -> Vec<HistoryEntry> {
    let opts = store.options();
    let mut out = opts.recorded_dois;
    match opts.history_sortby {
        HistorySort::Date => {}
        HistorySort::Title => {
            out.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        }
        HistorySort::Save => out.sort_by_key(|e| !e.save),
        HistorySort::Doi => out.sort_by(|a, b| a.doi.cmp(&b.doi)),
    }
    out
}

fn write_entries(store: &mut SettingsStore, entries: Vec<HistoryEntry>) {
    let patch = OptionsPatch {
        recorded_dois: Some(entries),
        ..Default::default()
    };
    store.set(StorageArea::Local, &patch);
}

fn write_queue(store: &mut SettingsStore, pending: Vec<String>) {
    let patch = OptionsPatch {
        history_doi_queue: Some(pending),
        ..Default::default()
    };
    store.set(StorageArea::Local, &patch);
}
