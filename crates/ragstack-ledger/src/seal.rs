//! Entry seals.
//!
//! A seal is the SHA-256 of the previous seal followed by the entry's
//! fields, each framed as an 8-byte little-endian length and its UTF-8
//! bytes:
//!
//!   prev_seal, run_id, sequence, kind, name, identifier, disposition,
//!   timestamp (RFC 3339, nanoseconds)
//!
//! Framing keeps `("ab", "c")` and `("a", "bc")` apart, so changing where
//! one field ends and the next begins also changes the seal.

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use ragstack_contracts::record::ResourceRecord;

use crate::entry::LedgerEntry;

fn frame(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field);
}

/// Seal one entry, as lowercase hex.
pub fn seal(run_id: &str, sequence: u64, record: &ResourceRecord, prev_seal: &str) -> String {
    let mut hasher = Sha256::new();
    frame(&mut hasher, prev_seal.as_bytes());
    frame(&mut hasher, run_id.as_bytes());
    frame(&mut hasher, &sequence.to_le_bytes());
    frame(&mut hasher, record.kind.to_string().as_bytes());
    frame(&mut hasher, record.name.as_bytes());
    frame(&mut hasher, record.identifier.as_bytes());
    frame(&mut hasher, record.disposition.as_str().as_bytes());
    frame(
        &mut hasher,
        record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    hex::encode(hasher.finalize())
}

/// Sequence number of the first entry that is out of place or whose seal
/// does not match its contents. `None` when the whole log holds.
pub fn first_broken(entries: &[LedgerEntry]) -> Option<u64> {
    let mut expected_prev = LedgerEntry::UNSEALED;

    for (position, entry) in entries.iter().enumerate() {
        let in_place = entry.sequence == position as u64 && entry.prev_seal == expected_prev;
        if !in_place || entry.seal != seal(&entry.run_id, entry.sequence, &entry.record, &entry.prev_seal) {
            return Some(position as u64);
        }
        expected_prev = entry.seal.as_str();
    }
    None
}
