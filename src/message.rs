//! Broadcast message payloads.
//!
//! Every message serializes to the `{"cmd": ..., "data": ...}` envelope
//! used between contexts. Delivery is fire-and-forget over a broadcast
//! channel; sending with zero receivers is not an error.

use serde::{Deserialize, Serialize};

use crate::options::patch::OptionsPatch;
use crate::types::OpSeq;

/// Payload of [`BusMessage::SettingsUpdated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdated {
    /// The sanitized change-set that was committed.
    pub options: OptionsPatch,
    /// True when dependent surfaces must fully reload instead of patching
    /// incrementally.
    pub force_update: bool,
}

/// Messages published by the session loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data", rename_all = "snake_case")]
pub enum BusMessage {
    /// One or more options changed in either area.
    SettingsUpdated(SettingsUpdated),
    /// A queue drain finished.
    QueueDrained {
        /// How many drained DOIs ended up present in the collection.
        recorded: usize,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
