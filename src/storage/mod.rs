//! Authoritative in-memory image of both storage areas.
//!
//! Every mutation funnels through one commit path with a value-equality
//! rule: a key whose incoming value equals its current value commits
//! nothing, so it raises no event and persists no write. Mirror echoes
//! between areas terminate on this rule.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde_json::Value;

use crate::options::names::{DEPRECATED_NAMES, OptionName};
use crate::options::patch::OptionsPatch;
use crate::options::{Options, RawEntries};
use crate::persist::{StoredWrite, WriteOp};
use crate::types::{OpSeq, StorageArea};

/// Old and new raw value of one key inside a change event.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// One committed batch of changes to a single area.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub area: StorageArea,
    pub changes: HashMap<String, KeyChange>,
    /// True when the reconciler mute flag was set at commit time, meaning
    /// the reconciler itself performed these writes.
    pub muted: bool,
}

impl StorageEvent {
    pub fn touches(&self, name: OptionName) -> bool {
        self.changes.contains_key(name.as_str())
    }

    /// Raw bag of keys this event set or replaced (removals excluded).
    pub fn new_values(&self) -> RawEntries {
        self.changes
            .iter()
            .filter_map(|(k, c)| c.new.clone().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    local: RawEntries,
    sync: RawEntries,
    pending_writes: Vec<StoredWrite>,
    pending_events: VecDeque<StorageEvent>,
    next_op_seq: OpSeq,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from persisted area contents.
    ///
    /// Loaded values are kept verbatim; sanitize happens on read, never
    /// on load, so junk written by older versions survives until a read
    /// or purge touches it.
    pub fn from_parts(local: RawEntries, sync: RawEntries, next_op_seq: OpSeq) -> Self {
        Self {
            local,
            sync,
            next_op_seq: next_op_seq.max(1),
            ..Self::default()
        }
    }

    /// Commits a patch's fields into one area. Returns whether anything
    /// actually changed.
    pub fn set(&mut self, area: StorageArea, patch: &OptionsPatch) -> bool {
        let updates = patch
            .to_raw()
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        self.commit(area, updates)
    }

    /// Applies raw key updates that originated outside this session, such
    /// as another device's sync push. `None` removes the key. Values are
    /// stored verbatim; reads sanitize them later.
    pub fn apply_external(
        &mut self,
        area: StorageArea,
        entries: Vec<(String, Option<Value>)>,
    ) -> bool {
        self.commit(area, entries)
    }

    /// Removes known options from one area.
    pub fn remove(&mut self, area: StorageArea, names: &[OptionName]) -> bool {
        let keys: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        self.remove_keys(area, &keys)
    }

    fn remove_keys(&mut self, area: StorageArea, keys: &[&str]) -> bool {
        let updates = keys.iter().map(|k| ((*k).to_string(), None)).collect();
        self.commit(area, updates)
    }

    /// Empties one area in a single persisted operation.
    pub fn clear(&mut self, area: StorageArea) -> bool {
        if self.area(area).is_empty() {
            return false;
        }
        let muted = self.listener_disabled();
        let drained: Vec<(String, Value)> = self.area_mut(area).drain().collect();
        let changes = drained
            .into_iter()
            .map(|(k, v)| {
                (
                    k,
                    KeyChange {
                        old: Some(v),
                        new: None,
                    },
                )
            })
            .collect();
        let seq = self.take_next_op_seq();
        self.pending_writes.push(StoredWrite {
            seq,
            ts_ms: now_ms(),
            op: WriteOp::Clear { area },
        });
        self.pending_events.push_back(StorageEvent {
            area,
            changes,
            muted,
        });
        true
    }

    /// Sanitized read of one area, optionally restricted to `names`.
    pub fn get(&self, area: StorageArea, names: Option<&[OptionName]>) -> OptionsPatch {
        match names {
            None => OptionsPatch::from_raw(self.area(area)),
            Some(names) => {
                let subset: RawEntries = names
                    .iter()
                    .filter_map(|n| {
                        self.area(area)
                            .get(n.as_str())
                            .map(|v| (n.as_str().to_string(), v.clone()))
                    })
                    .collect();
                OptionsPatch::from_raw(&subset)
            }
        }
    }

    /// Full typed view: defaults overlaid with whatever survives sanitize
    /// in the local area.
    pub fn options(&self) -> Options {
        let mut opts = Options::default();
        OptionsPatch::from_raw(&self.local).apply_to(&mut opts);
        opts
    }

    pub fn raw(&self, area: StorageArea) -> &RawEntries {
        self.area(area)
    }

    pub fn area_is_empty(&self, area: StorageArea) -> bool {
        self.area(area).is_empty()
    }

    pub fn listener_disabled(&self) -> bool {
        self.local
            .get(OptionName::StorageListenerDisabled.as_str())
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn sync_enabled(&self) -> bool {
        self.local
            .get(OptionName::SyncData.as_str())
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Writes the reconciler mute flag.
    pub fn set_listener_disabled(&mut self, on: bool) -> bool {
        self.commit(
            StorageArea::Local,
            vec![(
                OptionName::StorageListenerDisabled.as_str().to_string(),
                Some(Value::Bool(on)),
            )],
        )
    }

    /// Clears a mute flag left set by a crash. Returns whether recovery
    /// was needed.
    pub fn reset_listener_flag(&mut self) -> bool {
        if !self.listener_disabled() {
            return false;
        }
        self.set_listener_disabled(false);
        true
    }

    /// Drops retired option names from both areas. Returns how many keys
    /// were removed.
    pub fn purge_deprecated(&mut self) -> usize {
        let mut removed = 0;
        for area in [StorageArea::Local, StorageArea::Sync] {
            let present: Vec<&str> = DEPRECATED_NAMES
                .iter()
                .copied()
                .filter(|k| self.area(area).contains_key(*k))
                .collect();
            removed += present.len();
            if !present.is_empty() {
                self.remove_keys(area, &present);
            }
        }
        removed
    }

    /// Writes the default value for every known name absent from the
    /// local area. Returns how many were filled.
    pub fn fill_missing_defaults(&mut self) -> usize {
        let defaults = Options::default().to_raw();
        let missing: Vec<(String, Option<Value>)> = OptionName::ALL
            .iter()
            .filter(|n| !self.local.contains_key(n.as_str()))
            .filter_map(|n| {
                defaults
                    .get(n.as_str())
                    .map(|v| (n.as_str().to_string(), Some(v.clone())))
            })
            .collect();
        let count = missing.len();
        if count > 0 {
            self.commit(StorageArea::Local, missing);
        }
        count
    }

    pub fn take_event(&mut self) -> Option<StorageEvent> {
        self.pending_events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    pub fn drain_pending_writes(&mut self) -> Vec<StoredWrite> {
        std::mem::take(&mut self.pending_writes)
    }

    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn commit(&mut self, area: StorageArea, updates: Vec<(String, Option<Value>)>) -> bool {
        let muted = self.listener_disabled();
        let mut changes = HashMap::new();
        for (key, new) in updates {
            let old = self.area(area).get(&key).cloned();
            if old == new {
                continue;
            }
            let op = match &new {
                Some(v) => {
                    self.area_mut(area).insert(key.clone(), v.clone());
                    WriteOp::Put {
                        area,
                        key: key.clone(),
                        value: v.clone(),
                    }
                }
                None => {
                    self.area_mut(area).remove(&key);
                    WriteOp::Remove {
                        area,
                        key: key.clone(),
                    }
                }
            };
            let seq = self.take_next_op_seq();
            self.pending_writes.push(StoredWrite {
                seq,
                ts_ms: now_ms(),
                op,
            });
            changes.insert(key, KeyChange { old, new });
        }
        if changes.is_empty() {
            return false;
        }
        self.pending_events.push_back(StorageEvent {
            area,
            changes,
            muted,
        });
        true
    }

    fn area(&self, area: StorageArea) -> &RawEntries {
        match area {
            StorageArea::Local => &self.local,
            StorageArea::Sync => &self.sync,
        }
    }

    fn area_mut(&mut self, area: StorageArea) -> &mut RawEntries {
        match area {
            StorageArea::Local => &mut self.local,
            StorageArea::Sync => &mut self.sync,
        }
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
