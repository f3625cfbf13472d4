use serde_json::json;
use tempfile::TempDir;

use doisync::{
    options::{names::OptionName, patch::OptionsPatch},
    persist::{AreaSink, PersistError, StoredWrite, WriteOp, sqlite::SqliteAreaSink},
    storage::SettingsStore,
    types::StorageArea,
};

fn put(seq: u64, area: StorageArea, key: &str, value: serde_json::Value) -> StoredWrite {
    StoredWrite {
        seq,
        ts_ms: seq,
        op: WriteOp::Put {
            area,
            key: key.to_string(),
            value,
        },
    }
}

#[test]
fn sqlite_round_trips_both_areas() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("areas.db");

    let mut store = SettingsStore::new();
    store.fill_missing_defaults();
    store.set(
        StorageArea::Local,
        &OptionsPatch {
            qr_size: Some(450),
            history: Some(true),
            ..Default::default()
        },
    );
    store.apply_external(
        StorageArea::Sync,
        vec![("qr_title".to_string(), Some(json!(true)))],
    );
    store.remove(StorageArea::Local, &[OptionName::QrBgtrans]);

    let writes = store.drain_pending_writes();
    let last = writes.last().map(|w| w.seq).unwrap_or(0);

    let mut sink = SqliteAreaSink::open(&db_path).expect("open sqlite");
    assert_eq!(sink.apply_writes(&writes).expect("apply"), last);
    drop(sink);

    let reopened = SqliteAreaSink::open(&db_path).expect("reopen");
    assert_eq!(reopened.last_seq().expect("last_seq"), last);

    let loaded = reopened.load_store().expect("load");
    assert_eq!(loaded.raw(StorageArea::Local), store.raw(StorageArea::Local));
    assert_eq!(loaded.raw(StorageArea::Sync), store.raw(StorageArea::Sync));
    assert_eq!(loaded.latest_op_seq(), store.latest_op_seq());
    assert_eq!(loaded.options().qr_size, 450);
    assert!(!loaded.raw(StorageArea::Local).contains_key("qr_bgtrans"));
}

#[test]
fn clear_and_remove_survive_replay() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("wipe.db");

    let mut store = SettingsStore::new();
    store.set(
        StorageArea::Local,
        &OptionsPatch {
            qr_size: Some(450),
            ..Default::default()
        },
    );
    store.apply_external(
        StorageArea::Sync,
        vec![
            ("qr_size".to_string(), Some(json!(450))),
            ("qr_title".to_string(), Some(json!(true))),
        ],
    );
    store.clear(StorageArea::Sync);
    store.apply_external(
        StorageArea::Sync,
        vec![("qr_border".to_string(), Some(json!(4)))],
    );

    let mut sink = SqliteAreaSink::open(&db_path).expect("open sqlite");
    sink.apply_writes(&store.drain_pending_writes()).expect("apply");
    drop(sink);

    let loaded = SqliteAreaSink::open(&db_path)
        .expect("reopen")
        .load_store()
        .expect("load");

    // Only the post-clear write survives in the sync area.
    assert_eq!(loaded.raw(StorageArea::Sync).len(), 1);
    assert_eq!(
        loaded.raw(StorageArea::Sync).get("qr_border"),
        Some(&json!(4))
    );
    assert_eq!(loaded.raw(StorageArea::Local).get("qr_size"), Some(&json!(450)));
}

#[test]
fn batches_advance_the_durable_watermark() {
    let mut sink = SqliteAreaSink::open_in_memory().expect("open");
    assert_eq!(sink.last_seq().expect("last_seq"), 0);
    assert_eq!(sink.apply_writes(&[]).expect("empty"), 0);

    let writes: Vec<StoredWrite> = (1..=5u64)
        .map(|i| put(i, StorageArea::Local, &format!("key_{i}"), json!(i)))
        .collect();
    assert_eq!(sink.apply_writes(&writes).expect("apply"), 5);
    assert_eq!(sink.last_seq().expect("last_seq"), 5);
    assert_eq!(sink.apply_writes(&[]).expect("empty"), 5);

    // Later puts to the same key are last-write-wins.
    let update = vec![put(6, StorageArea::Local, "key_1", json!(100))];
    assert_eq!(sink.apply_writes(&update).expect("apply"), 6);
    let loaded = sink.load_store().expect("load");
    assert_eq!(loaded.raw(StorageArea::Local).get("key_1"), Some(&json!(100)));
}

#[test]
fn format_version_guard_rejects_unknown_databases() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("future.db");

    let sink = SqliteAreaSink::open(&db_path).expect("open sqlite");
    drop(sink);

    let conn = rusqlite::Connection::open(&db_path).expect("raw open");
    conn.execute(
        "UPDATE meta SET value = '99' WHERE key = 'format_version'",
        [],
    )
    .expect("tamper");
    drop(conn);

    let Err(err) = SqliteAreaSink::open(&db_path) else {
        panic!("open must reject a future format version");
    };
    match err {
        PersistError::Message(msg) => {
            assert!(msg.contains("unsupported storage format version"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
