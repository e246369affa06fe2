//! In-memory implementation of `ResourceLedger`.
//!
//! `InMemoryLedger` keeps the entries in a `Vec` behind `Arc<Mutex<_>>`, so a
//! clone can be handed to the provisioner while the caller keeps another to
//! export or verify afterwards. When an export path is set, finalizing also
//! writes the log there as JSON.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use ragstack_contracts::{
    error::{ProvisionError, ProvisionResult},
    record::ResourceRecord,
};
use ragstack_core::traits::ResourceLedger;

use crate::{
    entry::{LedgerEntry, LedgerLog},
    seal::{first_broken, seal},
};

// ── Internal mutable state ───────────────────────────────────────────────────

pub(crate) struct LedgerState {
    pub(crate) entries: Vec<LedgerEntry>,
    /// Next sequence number to assign.
    pub(crate) sequence: u64,
    /// `seal` of the last entry, or `UNSEALED`.
    pub(crate) last_seal: String,
    pub(crate) finalized_at: Option<chrono::DateTime<Utc>>,
}

// ── Public ledger ────────────────────────────────────────────────────────────

/// An append-only resource ledger for one provisioning run.
#[derive(Clone)]
pub struct InMemoryLedger {
    run_id: String,
    export_path: Option<PathBuf>,
    pub(crate) state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new(run_id: impl Into<String>) -> Self {
        let state = LedgerState {
            entries: Vec::new(),
            sequence: 0,
            last_seal: LedgerEntry::UNSEALED.to_string(),
            finalized_at: None,
        };
        Self {
            run_id: run_id.into(),
            export_path: None,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Also write the log as JSON to `path` when the run is finalized.
    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The records written so far, in write order.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn records(&self) -> Vec<ResourceRecord> {
        let state = self.state.lock().expect("ledger state lock poisoned");
        state.entries.iter().map(|e| e.record.clone()).collect()
    }

    /// Snapshot the entries as a `LedgerLog`.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn export_log(&self) -> LedgerLog {
        let state = self.state.lock().expect("ledger state lock poisoned");
        let last_seal = state
            .entries
            .last()
            .map(|e| e.seal.clone())
            .unwrap_or_default();

        LedgerLog {
            run_id: self.run_id.clone(),
            entries: state.entries.clone(),
            finalized_at: state.finalized_at,
            last_seal,
        }
    }

    /// True if no entry has been altered, dropped or reordered.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().expect("ledger state lock poisoned");
        first_broken(&state.entries).is_none()
    }

    /// Write the current log to `path` as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> ProvisionResult<()> {
        let log = self.export_log();
        let json = serde_json::to_string_pretty(&log).map_err(|e| {
            ProvisionError::fatal("export ledger", format!("failed to serialize ledger: {e}"))
        })?;
        std::fs::write(path, json).map_err(|e| {
            ProvisionError::fatal(
                "export ledger",
                format!("failed to write '{}': {}", path.display(), e),
            )
        })?;
        debug!(path = %path.display(), entries = log.entries.len(), "ledger exported");
        Ok(())
    }

    fn lock(&self) -> ProvisionResult<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|e| ProvisionError::fatal("ledger write", format!("state lock poisoned: {e}")))
    }
}

// ── ResourceLedger impl ──────────────────────────────────────────────────────

impl ResourceLedger for InMemoryLedger {
    /// Append one record. Fails once the ledger is finalized.
    fn record(&self, record: &ResourceRecord) -> ProvisionResult<()> {
        let mut state = self.lock()?;
        if state.finalized_at.is_some() {
            return Err(ProvisionError::fatal(
                "ledger write",
                format!("ledger for run '{}' is already finalized", self.run_id),
            ));
        }

        let prev_seal = state.last_seal.clone();
        let sequence = state.sequence;
        let entry_seal = seal(&self.run_id, sequence, record, &prev_seal);
        debug!(
            sequence,
            kind = %record.kind,
            name = %record.name,
            disposition = record.disposition.as_str(),
            "ledger entry sealed"
        );

        state.entries.push(LedgerEntry {
            sequence,
            run_id: self.run_id.clone(),
            record: record.clone(),
            prev_seal,
            seal: entry_seal.clone(),
        });
        state.sequence += 1;
        state.last_seal = entry_seal;
        Ok(())
    }

    fn finalize(&self, run_id: &str) -> ProvisionResult<()> {
        if run_id != self.run_id {
            return Err(ProvisionError::fatal(
                "ledger finalize",
                format!("ledger belongs to run '{}', not '{}'", self.run_id, run_id),
            ));
        }

        {
            let mut state = self.lock()?;
            state.finalized_at.get_or_insert_with(Utc::now);
            info!(
                run_id = %run_id,
                entry_count = state.entries.len(),
                last_seal = %state.last_seal,
                "ledger finalized"
            );
        }

        match &self.export_path {
            Some(path) => self.write_json(path),
            None => Ok(()),
        }
    }
}
