//! Ledger entry and exported log types.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    record::ResourceRecord,
};

/// One resource record, numbered and sealed against the entry before it.
///
/// Editing any field of the record invalidates `seal` and every later
/// `prev_seal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    pub run_id: String,
    pub record: ResourceRecord,
    /// `seal` of the previous entry, or `UNSEALED` for the first.
    pub prev_seal: String,
    pub seal: String,
}

impl LedgerEntry {
    /// `prev_seal` of the first entry in every log: 64 hex zeros.
    pub const UNSEALED: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// Everything one provisioning run wrote, as exported for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLog {
    pub run_id: String,
    pub entries: Vec<LedgerEntry>,
    /// When the run was finalized. `None` if it never was.
    pub finalized_at: Option<DateTime<Utc>>,
    /// `seal` of the last entry. Empty when there are no entries.
    pub last_seal: String,
}

impl LedgerLog {
    /// Read a log previously written by `InMemoryLedger::write_json`.
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::fatal("load ledger", format!("failed to read '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            ProvisionError::fatal("load ledger", format!("'{}' is not a ledger: {}", path.display(), e))
        })
    }

    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    /// Sequence of the first tampered or misplaced entry, if any.
    pub fn first_broken(&self) -> Option<u64> {
        crate::seal::first_broken(&self.entries)
    }
}
