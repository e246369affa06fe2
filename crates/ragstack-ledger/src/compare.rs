//! Comparing the ledgers of two runs with the same run id.
//!
//! A rerun is expected to reuse everything the first run left behind. Any
//! resource it had to create again, or that now answers to a different
//! identifier, was deleted or replaced out of band in between.

use std::collections::BTreeMap;
use std::fmt;

use ragstack_contracts::record::{Disposition, ResourceKind, ResourceRecord};

use crate::entry::LedgerLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Not in the earlier run at all.
    New,
    /// Recorded by both runs but created again by the later one.
    Recreated,
    /// Same name, different provider identifier.
    IdentifierChanged { before: String, after: String },
    /// Recorded by the earlier run only.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDrift {
    pub kind: ResourceKind,
    pub name: String,
    pub drift: Drift,
}

impl fmt::Display for ResourceDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.drift {
            Drift::New => write!(f, "{} '{}' is new", self.kind, self.name),
            Drift::Recreated => write!(f, "{} '{}' was created again", self.kind, self.name),
            Drift::IdentifierChanged { before, after } => {
                write!(f, "{} '{}' moved from {} to {}", self.kind, self.name, before, after)
            }
            Drift::Missing => write!(f, "{} '{}' was not touched", self.kind, self.name),
        }
    }
}

/// Resources whose state differs between `earlier` and `later`.
///
/// Objects and ingestion jobs are written fresh on every run and are left
/// out. When a run records the same resource more than once, its last record
/// counts.
pub fn compare_runs(earlier: &LedgerLog, later: &LedgerLog) -> Vec<ResourceDrift> {
    let before = latest_by_resource(earlier);
    let after = latest_by_resource(later);

    let mut drifts = Vec::new();
    for ((kind, name), record) in &after {
        let drift = match before.get(&(*kind, name.clone())) {
            None => Some(Drift::New),
            Some(prior) if prior.identifier != record.identifier => Some(Drift::IdentifierChanged {
                before: prior.identifier.clone(),
                after: record.identifier.clone(),
            }),
            Some(_) if record.disposition == Disposition::Created => Some(Drift::Recreated),
            Some(_) => None,
        };
        if let Some(drift) = drift {
            drifts.push(ResourceDrift {
                kind: *kind,
                name: name.clone(),
                drift,
            });
        }
    }
    for (kind, name) in before.keys() {
        if !after.contains_key(&(*kind, name.clone())) {
            drifts.push(ResourceDrift {
                kind: *kind,
                name: name.clone(),
                drift: Drift::Missing,
            });
        }
    }
    drifts
}

fn latest_by_resource(log: &LedgerLog) -> BTreeMap<(ResourceKind, String), &ResourceRecord> {
    log.records()
        .filter(|r| !matches!(r.kind, ResourceKind::Object | ResourceKind::IngestionJob))
        .map(|r| ((r.kind, r.name.clone()), r))
        .collect()
}
