use doisync::{
    history::{self, RecordOutcome},
    options::{HistorySort, patch::OptionsPatch},
    storage::SettingsStore,
    types::StorageArea,
};

fn store_with_history(cap: u32) -> SettingsStore {
    let mut store = SettingsStore::new();
    store.fill_missing_defaults();
    let patch = OptionsPatch {
        history: Some(true),
        history_length: Some(cap),
        ..Default::default()
    };
    store.set(StorageArea::Local, &patch);
    while store.take_event().is_some() {}
    store
}

fn dois(store: &SettingsStore) -> Vec<String> {
    store
        .options()
        .recorded_dois
        .into_iter()
        .map(|e| e.doi)
        .collect()
}

#[test]
fn recording_appends_and_deduplicates() {
    let mut store = store_with_history(10);

    assert!(matches!(
        history::record(&mut store, "10.1000/a", None, true),
        RecordOutcome::Recorded { needs_title: false }
    ));
    assert!(matches!(
        history::record(&mut store, "10.1000/b", None, true),
        RecordOutcome::Recorded { .. }
    ));
    assert!(matches!(
        history::record(&mut store, "10.1000/a", None, true),
        RecordOutcome::Unchanged { needs_title: false }
    ));

    assert_eq!(dois(&store), vec!["10.1000/a", "10.1000/b"]);
}

#[test]
fn explicit_title_overwrites_in_place() {
    let mut store = store_with_history(10);
    for doi in ["10.1000/a", "10.1000/b", "10.1000/c"] {
        history::record(&mut store, doi, None, true);
    }

    let outcome = history::record(&mut store, "10.1000/a", Some("First"), true);
    assert_eq!(outcome, RecordOutcome::TitleUpdated);

    // The entry keeps its position; only the title moved.
    assert_eq!(dois(&store), vec!["10.1000/a", "10.1000/b", "10.1000/c"]);
    assert_eq!(store.options().recorded_dois[0].title, "First");
}

#[test]
fn eviction_removes_oldest_unsaved_entry() {
    let mut store = store_with_history(3);
    for doi in ["10.1000/a", "10.1000/b", "10.1000/c"] {
        history::record(&mut store, doi, None, true);
    }

    assert!(matches!(
        history::record(&mut store, "10.1000/d", None, true),
        RecordOutcome::Recorded { .. }
    ));
    assert_eq!(dois(&store), vec!["10.1000/b", "10.1000/c", "10.1000/d"]);
}

#[test]
fn saved_entries_survive_eviction() {
    let mut store = store_with_history(3);
    for doi in ["10.1000/a", "10.1000/b", "10.1000/c"] {
        history::record(&mut store, doi, None, true);
    }
    assert!(history::set_saved(&mut store, "10.1000/a", true));

    history::record(&mut store, "10.1000/d", None, true);
    assert_eq!(dois(&store), vec!["10.1000/a", "10.1000/c", "10.1000/d"]);
    assert!(store.options().recorded_dois[0].save);
}

#[test]
fn insertion_rejected_when_every_entry_is_pinned() {
    let mut store = store_with_history(2);
    history::record(&mut store, "10.1000/a", None, true);
    history::record(&mut store, "10.1000/b", None, true);
    assert!(history::set_saved(&mut store, "10.1000/a", true));
    assert!(history::set_saved(&mut store, "10.1000/b", true));

    assert_eq!(
        history::record(&mut store, "10.1000/c", None, true),
        RecordOutcome::RejectedFull
    );
    assert_eq!(dois(&store), vec!["10.1000/a", "10.1000/b"]);
}

#[test]
fn oversized_collection_suspends_recording() {
    let mut store = store_with_history(10);
    for i in 0..5 {
        history::record(&mut store, &format!("10.1000/{i}"), None, true);
    }

    // Lowering the cap below the count must not truncate the log.
    let patch = OptionsPatch {
        history_length: Some(3),
        ..Default::default()
    };
    store.set(StorageArea::Local, &patch);

    assert_eq!(
        history::record(&mut store, "10.1000/new", None, true),
        RecordOutcome::Oversized
    );
    assert_eq!(dois(&store).len(), 5);

    // Deleting back down to the cap resumes normal recording.
    assert!(history::delete(&mut store, "10.1000/0"));
    assert!(history::delete(&mut store, "10.1000/1"));
    assert!(matches!(
        history::record(&mut store, "10.1000/new", None, true),
        RecordOutcome::Recorded { .. }
    ));
    assert_eq!(dois(&store).len(), 3);
}

#[test]
fn disabled_history_is_inert() {
    let mut store = SettingsStore::new();
    store.fill_missing_defaults();
    while store.take_event().is_some() {}

    assert_eq!(
        history::record(&mut store, "10.1000/a", None, true),
        RecordOutcome::Disabled
    );
    assert!(!history::queue(&mut store, "10.1000/a"));
    assert!(dois(&store).is_empty());
    assert!(store.options().history_doi_queue.is_empty());
}

#[test]
fn queue_drains_to_empty_and_returns_contents() {
    let mut store = store_with_history(10);
    assert!(history::queue(&mut store, "10.1000/a"));
    assert!(history::queue(&mut store, "10.1000/b"));

    let drained = history::drain_queue(&mut store);
    assert_eq!(drained, vec!["10.1000/a", "10.1000/b"]);
    assert!(store.options().history_doi_queue.is_empty());

    // Draining alone records nothing; callers feed the result to record.
    assert!(dois(&store).is_empty());
    assert!(history::drain_queue(&mut store).is_empty());
}

#[test]
fn title_fetch_is_gated_by_option_and_existing_title() {
    let mut store = store_with_history(10);
    let patch = OptionsPatch {
        history_fetch_title: Some(true),
        ..Default::default()
    };
    store.set(StorageArea::Local, &patch);

    assert_eq!(
        history::record(&mut store, "10.1000/a", None, true),
        RecordOutcome::Recorded { needs_title: true }
    );
    assert_eq!(
        history::record(&mut store, "10.1000/a", None, true),
        RecordOutcome::Unchanged { needs_title: true }
    );
    // Fetch suppressed by the caller wins over the option.
    assert_eq!(
        history::record(&mut store, "10.1000/a", None, false),
        RecordOutcome::Unchanged { needs_title: false }
    );

    assert!(history::patch_title(&mut store, "10.1000/a", "Found"));
    assert!(!history::patch_title(&mut store, "10.1000/a", "Found"));
    assert!(!history::patch_title(&mut store, "10.1000/missing", "X"));

    assert_eq!(
        history::record(&mut store, "10.1000/a", None, true),
        RecordOutcome::Unchanged { needs_title: false }
    );
}

#[test]
fn delete_and_clear_ignore_pinning() {
    let mut store = store_with_history(10);
    history::record(&mut store, "10.1000/a", None, true);
    history::record(&mut store, "10.1000/b", None, true);
    assert!(history::set_saved(&mut store, "10.1000/a", true));

    assert!(history::delete(&mut store, "10.1000/a"));
    assert!(!history::delete(&mut store, "10.1000/a"));
    assert_eq!(dois(&store), vec!["10.1000/b"]);

    history::record(&mut store, "10.1000/c", None, true);
    assert!(history::set_saved(&mut store, "10.1000/c", true));
    assert_eq!(history::clear(&mut store), 2);
    assert!(dois(&store).is_empty());
    assert_eq!(history::clear(&mut store), 0);
}

#[test]
fn set_saved_reports_changes_only() {
    let mut store = store_with_history(10);
    history::record(&mut store, "10.1000/a", None, true);

    assert!(history::set_saved(&mut store, "10.1000/a", true));
    assert!(!history::set_saved(&mut store, "10.1000/a", true));
    assert!(history::set_saved(&mut store, "10.1000/a", false));
    assert!(!history::set_saved(&mut store, "10.1000/missing", true));
}

#[test]
fn entries_follow_the_sort_option() {
    let mut store = store_with_history(10);
    history::record(&mut store, "10.1000/c", Some("beta"), true);
    history::record(&mut store, "10.1000/a", Some("Alpha"), true);
    history::record(&mut store, "10.1000/b", Some("gamma"), true);
    assert!(history::set_saved(&mut store, "10.1000/b", true));

    let set_sort = |store: &mut SettingsStore, sort| {
        let patch = OptionsPatch {
            history_sortby: Some(sort),
            ..Default::default()
        };
        store.set(StorageArea::Local, &patch);
    };

    let order = |entries: Vec<doisync::types::HistoryEntry>| {
        entries.into_iter().map(|e| e.doi).collect::<Vec<_>>()
    };

    set_sort(&mut store, HistorySort::Date);
    assert_eq!(
        order(history::entries(&store)),
        vec!["10.1000/c", "10.1000/a", "10.1000/b"]
    );

    set_sort(&mut store, HistorySort::Title);
    assert_eq!(
        order(history::entries(&store)),
        vec!["10.1000/a", "10.1000/c", "10.1000/b"]
    );

    set_sort(&mut store, HistorySort::Save);
    assert_eq!(
        order(history::entries(&store)),
        vec!["10.1000/b", "10.1000/c", "10.1000/a"]
    );

    set_sort(&mut store, HistorySort::Doi);
    assert_eq!(
        order(history::entries(&store)),
        vec!["10.1000/a", "10.1000/b", "10.1000/c"]
    );
}
