//! The change reconciler.
//!
//! Reacts to committed storage events: sanitizes the change-set, runs
//! local hooks, mirrors sync-eligible values into the other area while
//! sync is on, and announces the change. The persisted mute flag breaks
//! the self-reference cycle: writes the reconciler performs are stamped
//! muted at commit and never reacted to, and the flag itself survives a
//! crash so startup can recover a stuck state.

use tracing::{debug, info};

use crate::message::SettingsUpdated;
use crate::options::names::OptionName;
use crate::options::patch::OptionsPatch;
use crate::storage::{SettingsStore, StorageEvent};
use crate::types::StorageArea;

/// Work a react pass asks the session to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish a settings-updated message.
    Broadcast(SettingsUpdated),
    /// Recompute feature toggles and push differences to the host.
    RefreshFeatures,
    /// Drain the pending DOI queue and record its contents.
    DrainHistoryQueue,
}

/// Reacts to one storage change event.
///
/// Ordering is load-bearing: the mute gates come first or a mirrored
/// write would recurse through its own echo; the sync_data-on branch
/// returns early because enabling sync is a merge, not a verbatim mirror.
pub fn react(store: &mut SettingsStore, event: &StorageEvent) -> Vec<Effect> {
    if event.changes.len() == 1 && event.touches(OptionName::StorageListenerDisabled) {
        return Vec::new();
    }
    if event.muted || store.listener_disabled() {
        debug!(area = ?event.area, "reconciler muted; ignoring event");
        return Vec::new();
    }

    let changed = OptionsPatch::from_raw(&event.new_values());
    let mut effects = Vec::new();

    if event.area == StorageArea::Local {
        if changed.context_menu.is_some() || changed.auto_link.is_some() {
            effects.push(Effect::RefreshFeatures);
        }
        if matches!(&changed.history_doi_queue, Some(q) if !q.is_empty()) {
            effects.push(Effect::DrainHistoryQueue);
        }
        if changed.sync_data == Some(true) {
            effects.extend(enable_sync(store));
            return effects;
        }
    }

    if event.area == StorageArea::Sync {
        effects.extend(verify_sync_state(store));
    }

    let mirror = changed.sync_subset();
    if store.sync_enabled() && !mirror.is_empty() {
        with_listener_muted(store, |s| {
            s.set(event.area.other(), &mirror);
        });
    }

    // A history flip to false ends the collection and queue, but only
    // once the flip holds locally: committed there directly or just
    // landed by the mirror. Cleared fields join the announcement.
    let mut announce = changed;
    if announce.history == Some(false)
        && (event.area == StorageArea::Local || store.sync_enabled())
        && wipe_history(store)
    {
        announce.recorded_dois = Some(Vec::new());
        announce.history_doi_queue = Some(Vec::new());
    }

    if !announce.is_empty() {
        effects.push(Effect::Broadcast(SettingsUpdated {
            force_update: announce.forces_refresh(),
            options: announce,
        }));
    }
    effects
}

/// One-directional seed when sync turns on.
///
/// For every sync-eligible option the sync-area value wins; local only
/// fills the gaps. Both areas end up holding the merged result, and every
/// surface is told to fully reload.
pub fn enable_sync(store: &mut SettingsStore) -> Vec<Effect> {
    let local = store.get(StorageArea::Local, None).sync_subset();
    let sync = store.get(StorageArea::Sync, None).sync_subset();

    let mut merged_raw = local.to_raw();
    for (k, v) in sync.to_raw() {
        merged_raw.insert(k, v);
    }
    let merged = OptionsPatch::from_raw(&merged_raw);

    info!("sync enabled; seeding both areas from the merged option set");
    with_listener_muted(store, |s| {
        s.set(StorageArea::Local, &merged);
        s.set(StorageArea::Sync, &merged);
    });

    let mut announce = merged;
    announce.sync_data = Some(true);
    vec![Effect::Broadcast(SettingsUpdated {
        options: announce,
        force_update: true,
    })]
}

/// Detects an out-of-band wipe of the sync area.
///
/// A user clearing sync data through platform account settings leaves
/// this installation believing sync is on while the area is empty. The
/// correction flips `sync_data` off and forces a reload. Runs at startup
/// and on every sync-area event.
pub fn verify_sync_state(store: &mut SettingsStore) -> Vec<Effect> {
    if !store.sync_enabled() || !store.area_is_empty(StorageArea::Sync) {
        return Vec::new();
    }

    info!("sync area wiped externally; disabling sync");
    let off = OptionsPatch {
        sync_data: Some(false),
        ..Default::default()
    };
    with_listener_muted(store, |s| {
        s.set(StorageArea::Local, &off);
    });

    vec![Effect::Broadcast(SettingsUpdated {
        options: off,
        force_update: true,
    })]
}

/// Empties the recorded collection and queue after history turns off.
/// Returns whether anything was actually cleared; the caller folds the
/// cleared fields into its announcement.
fn wipe_history(store: &mut SettingsStore) -> bool {
    let wipe = OptionsPatch {
        recorded_dois: Some(Vec::new()),
        history_doi_queue: Some(Vec::new()),
        ..Default::default()
    };
    let wiped = with_listener_muted(store, |s| s.set(StorageArea::Local, &wipe));
    if wiped {
        info!("history disabled; cleared the recorded collection and queue");
    }
    wiped
}

/// Runs reconciler-owned writes with the persisted mute flag held,
/// clearing it before returning. In-memory commits are infallible, so a
/// scoped set/clear pair covers every exit path; a process death in
/// between is what the startup flag recovery exists for.
fn with_listener_muted<T>(store: &mut SettingsStore, f: impl FnOnce(&mut SettingsStore) -> T) -> T {
    store.set_listener_disabled(true);
    let out = f(store);
    store.set_listener_disabled(false);
    out
}
