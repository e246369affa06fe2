//! # ragstack-ledger
//!
//! Append-only, sealed record of every resource a provisioning run creates
//! or reuses.
//!
//! The provider can only be queried by the identifiers it returned, so a run
//! that fails halfway must still leave those identifiers behind. Each
//! `ResourceRecord` is wrapped in a `LedgerEntry` whose seal commits to the
//! record's kind, name, identifier and disposition and to the previous seal;
//! editing or dropping an entry shows up in `first_broken`.
//!
//! Two exported logs of the same run id can be compared with
//! [`compare_runs`] to see what a rerun had to create again.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragstack_ledger::{compare_runs, InMemoryLedger, LedgerLog};
//!
//! let earlier = LedgerLog::load(Path::new("ledger.json"))?;
//! let ledger = InMemoryLedger::new("a1b2c3").with_export_path("ledger.json");
//! let provisioner = Provisioner::new(providers, Box::new(ledger.clone()), verifier, sleeper, config)?;
//! provisioner.run()?;
//!
//! assert!(ledger.verify_integrity());
//! for drift in compare_runs(&earlier, &ledger.export_log()) {
//!     println!("{drift}");
//! }
//! ```

pub mod compare;
pub mod entry;
pub mod memory;
pub mod seal;

pub use compare::{compare_runs, Drift, ResourceDrift};
pub use entry::{LedgerEntry, LedgerLog};
pub use memory::InMemoryLedger;
pub use seal::{first_broken, seal};

// ── Tests ────────────────────────────────────────────────────────────────────
