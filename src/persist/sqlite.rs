//! SQLite-backed mirror of both storage areas.
//!
//! Writes are applied last-write-wins into a keyed table rather than
//! journaled, matching the storage model being mirrored. The `meta` table
//! carries the format version and the durable sequence watermark.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::{
    options::RawEntries,
    storage::SettingsStore,
    types::{OpSeq, StorageArea},
};

use super::{AreaSink, PersistError, PersistResult, StoredWrite, WriteOp};

const KV_FORMAT_VERSION: u16 = 1;

/// SQLite implementation of [`crate::persist::AreaSink`].
pub struct SqliteAreaSink {
    conn: Connection,
}

impl SqliteAreaSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let sink = Self { conn };
        sink.check_format()?;
        Ok(sink)
    }

    /// Rebuilds a store from the persisted contents of both areas.
    pub fn load_store(&self) -> PersistResult<SettingsStore> {
        let mut local = RawEntries::new();
        let mut sync = RawEntries::new();

        let mut stmt = self.conn.prepare("SELECT area, key, value FROM kv")?;
        let rows = stmt.query_map([], |row| {
            let area: i64 = row.get(0)?;
            let key: String = row.get(1)?;
            let value: String = row.get(2)?;
            Ok((area, key, value))
        })?;

        for row in rows {
            let (area, key, value) = row?;
            let value: Value = serde_json::from_str(&value)?;
            match StorageArea::from_tag(area as u8) {
                Some(StorageArea::Local) => {
                    local.insert(key, value);
                }
                Some(StorageArea::Sync) => {
                    sync.insert(key, value);
                }
                // Rows tagged with an unknown area stay on disk but are
                // never loaded.
                None => {}
            }
        }

        let next_seq = self.last_seq()?.saturating_add(1);
        Ok(SettingsStore::from_parts(local, sync, next_seq))
    }

    /// Returns the highest sequence recorded as durable.
    pub fn last_seq(&self) -> PersistResult<OpSeq> {
        let stored: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'last_seq'", [], |row| {
                row.get(0)
            })
            .optional()?;

        match stored {
            None => Ok(0),
            Some(v) => v
                .parse::<OpSeq>()
                .map_err(|e| PersistError::Message(format!("bad last_seq value: {e}"))),
        }
    }

    fn check_format(&self) -> PersistResult<()> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'format_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(v) if v == KV_FORMAT_VERSION.to_string() => Ok(()),
            Some(v) => Err(PersistError::Message(format!(
                "unsupported storage format version: {v}"
            ))),
            None => {
                self.conn.execute(
                    "INSERT INTO meta(key, value) VALUES ('format_version', ?1)",
                    params![KV_FORMAT_VERSION.to_string()],
                )?;
                Ok(())
            }
        }
    }
}

impl AreaSink for SqliteAreaSink {
    fn apply_writes(&mut self, writes: &[StoredWrite]) -> PersistResult<OpSeq> {
        if writes.is_empty() {
            return self.last_seq();
        }

        let tx = self.conn.transaction()?;
        {
            let mut put = tx.prepare(
                "INSERT INTO kv(area, key, value, updated_ms) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(area, key) DO UPDATE SET value = excluded.value, \
                 updated_ms = excluded.updated_ms",
            )?;
            let mut del = tx.prepare("DELETE FROM kv WHERE area = ?1 AND key = ?2")?;

            for stored in writes {
                match &stored.op {
                    WriteOp::Put { area, key, value } => {
                        let payload = serde_json::to_string(value)?;
                        put.execute(params![
                            area.tag() as i64,
                            key,
                            payload,
                            stored.ts_ms as i64,
                        ])?;
                    }
                    WriteOp::Remove { area, key } => {
                        del.execute(params![area.tag() as i64, key])?;
                    }
                    WriteOp::Clear { area } => {
                        tx.execute("DELETE FROM kv WHERE area = ?1", params![area.tag() as i64])?;
                    }
                }
            }

            let last = writes.last().map(|w| w.seq).unwrap_or(0);
            tx.execute(
                "INSERT INTO meta(key, value) VALUES ('last_seq', ?1) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![last.to_string()],
            )?;
        }
        tx.commit()?;

        Ok(writes.last().map(|w| w.seq).unwrap_or(0))
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}
