//! Read-only view over the backend's persisted prompt/response memory.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// One remembered exchange, as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub prompt: String,
    pub response: String,
    pub timestamp: String,
}

impl MemoryEntry {
    /// Timestamp rendered in local time.
    ///
    /// The backend writes naive ISO-8601 local times; zoned RFC 3339 values
    /// are converted. Anything unparseable is shown as received.
    pub fn local_timestamp(&self) -> String {
        const DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

        if let Ok(zoned) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return zoned.with_timezone(&Local).format(DISPLAY).to_string();
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
            return match Local.from_local_datetime(&naive).earliest() {
                Some(local) => local.format(DISPLAY).to_string(),
                None => naive.format(DISPLAY).to_string(),
            };
        }
        self.timestamp.clone()
    }
}

pub const LOADING_TEXT: &str = "Loading memory...";
pub const EMPTY_TEXT: &str = "No memory entries yet.";
pub const CLEAR_PROMPT: &str = "Are you sure you want to clear all memory?";

/// What the memory panel body currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryView {
    Loading,
    Error(String),
    Empty,
    /// Newest first
    Entries(Vec<MemoryEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPanel {
    pub open: bool,
    pub view: MemoryView,
}

impl Default for MemoryPanel {
    fn default() -> Self {
        Self {
            open: false,
            view: MemoryView::Empty,
        }
    }
}

impl MemoryPanel {
    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn begin_loading(&mut self) {
        self.view = MemoryView::Loading;
    }

    /// Show fetched entries, newest first.
    pub fn show_entries(&mut self, mut entries: Vec<MemoryEntry>) {
        if entries.is_empty() {
            self.view = MemoryView::Empty;
            return;
        }
        entries.reverse();
        self.view = MemoryView::Entries(entries);
    }

    pub fn show_error(&mut self, message: impl std::fmt::Display) {
        self.view = MemoryView::Error(format!("Error: {}", message));
    }
}
