pub mod sqlite;

use serde_json::Value;

use crate::types::{OpSeq, StorageArea};

#[derive(Debug)]
pub enum PersistError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    Message(String),
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// One storage mutation. `Put` and `Remove` touch a single key; `Clear`
/// empties a whole area.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        area: StorageArea,
        key: String,
        value: Value,
    },
    Remove {
        area: StorageArea,
        key: String,
    },
    Clear {
        area: StorageArea,
    },
}

/// A sequenced mutation as handed to a sink. `seq` is the durability
/// watermark acknowledged back to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWrite {
    pub seq: OpSeq,
    pub ts_ms: u64,
    pub op: WriteOp,
}

/// Where committed writes go. Implementations apply batches in order and
/// report the highest sequence made durable.
pub trait AreaSink: Send {
    fn apply_writes(&mut self, writes: &[StoredWrite]) -> PersistResult<OpSeq>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
