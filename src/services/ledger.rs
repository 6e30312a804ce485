//! Per-channel download ledger
//!
//! The downloader appends one line per completed item to
//! `<data_dir>/<channel>/archive.txt`, usually `<extractor> <id>` (e.g. `twitch v123`).
//! We never write the file; we snapshot it before and after a fetch and diff
//! the two snapshots to find what the fetch added.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

/// File name of the ledger inside a channel directory
pub const LEDGER_FILE_NAME: &str = "archive.txt";

/// Raw, trimmed, non-blank ledger lines at one point in time
pub type LedgerSnapshot = HashSet<String>;

/// Read the ledger into a snapshot.
///
/// A missing ledger is an empty snapshot. Any other read failure (permissions,
/// invalid UTF-8) is logged and also treated as empty, which can under-report
/// new items for this run but never fails it.
pub async fn read_snapshot(path: &Path) -> LedgerSnapshot {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let snapshot = parse_snapshot(&contents);
            debug!(
                ledger = %path.display(),
                entries = snapshot.len(),
                "Read ledger snapshot"
            );
            snapshot
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(ledger = %path.display(), "No ledger yet");
            LedgerSnapshot::new()
        }
        Err(e) => {
            warn!(
                ledger = %path.display(),
                error = %e,
                "Failed to read ledger, treating as empty"
            );
            LedgerSnapshot::new()
        }
    }
}

fn parse_snapshot(contents: &str) -> LedgerSnapshot {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Entries present in `after` but not in `before`
pub fn new_entries(before: &LedgerSnapshot, after: &LedgerSnapshot) -> LedgerSnapshot {
    after.difference(before).cloned().collect()
}

/// Item identifier of a ledger entry.
///
/// Two whitespace-separated fields are `<type> <id>` and yield the id;
/// anything else is taken as the identifier verbatim.
pub fn extract_identifier(entry: &str) -> &str {
    let mut fields = entry.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(_), Some(id), None) => id,
        _ => entry,
    }
}
