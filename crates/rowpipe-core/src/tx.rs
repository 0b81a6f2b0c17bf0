use serde::{Deserialize, Serialize};

use crate::id::TxId;

/// Read-only transaction state shared by every evaluation in a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxContext {
    pub id: TxId,
    pub snapshot_ts: u64,
}

impl TxContext {
    pub fn new(id: TxId, snapshot_ts: u64) -> Self {
        Self { id, snapshot_ts }
    }
}
