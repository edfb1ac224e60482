//! The bounded audit trail.

use chrono::{DateTime, Utc};

use super::format;
use crate::models::*;

/// Maximum number of entries kept per project.
pub const HISTORY_LIMIT: usize = 20;

/// Appends `entry` and evicts the oldest entries beyond [`HISTORY_LIMIT`].
///
/// The only mutator of a history list. Entries are never edited, reordered,
/// or removed from the middle.
pub fn append(history: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    history.push(entry);
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
}

/// Builds an entry for `changes`, described by the formatter.
pub fn entry(
    kind: HistoryKind,
    changes: Vec<Change>,
    actor: &Actor,
    timestamp: DateTime<Utc>,
) -> HistoryEntry {
    HistoryEntry {
        kind,
        description: format::describe(kind, &changes),
        changes,
        timestamp,
        user_id: actor.id.clone(),
        user_name: actor.name.clone(),
    }
}

pub fn created(actor: &Actor, timestamp: DateTime<Utc>) -> HistoryEntry {
    entry(HistoryKind::Created, Vec::new(), actor, timestamp)
}
