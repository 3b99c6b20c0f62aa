use chrono::{DateTime, Local};
use serde::Serialize;

use crate::model::InvoiceFields;

/// One completed extraction kept in the session history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub filename: String,
    pub timestamp: DateTime<Local>,
    pub fields: InvoiceFields,
}

/// In-memory, newest-first log of completed extractions.
///
/// Nothing here is persisted; dropping the history drops every entry.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    next_id: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result and return the stored entry.
    pub fn record(&mut self, filename: impl Into<String>, fields: InvoiceFields) -> &HistoryEntry {
        self.next_id += 1;
        let entry = HistoryEntry {
            id: self.next_id,
            filename: filename.into(),
            timestamp: Local::now(),
            fields,
        };
        self.entries.insert(0, entry);
        &self.entries[0]
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn find(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
