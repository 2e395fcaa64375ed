//! State of the online-search panel.

use crate::platform::SearchPlatform;

pub const PLACEHOLDER_TEXT: &str = "Search results will appear here...";
pub const SEARCHING_TEXT: &str = "Searching...";

/// What the result area currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchView {
    Placeholder,
    Searching,
    Error(String),
    Results {
        platform: SearchPlatform,
        content: String,
    },
}

impl SearchView {
    /// Heading shown above a result, e.g. `Results from CLAUDE:`
    pub fn results_heading(platform: SearchPlatform) -> String {
        format!("Results from {}:", platform.as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPanel {
    pub open: bool,
    pub query: String,
    /// Character cursor into `query`
    pub cursor: usize,
    pub platform: SearchPlatform,
    pub view: SearchView,
}

impl SearchPanel {
    pub fn new(platform: SearchPlatform) -> Self {
        Self {
            open: false,
            query: String::new(),
            cursor: 0,
            platform,
            view: SearchView::Placeholder,
        }
    }

    pub fn open(&mut self) {
        self.open = true;
        self.query.clear();
        self.cursor = 0;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.query.clear();
        self.cursor = 0;
        self.view = SearchView::Placeholder;
    }

    /// Make `platform` the single active option.
    pub fn select_platform(&mut self, platform: SearchPlatform) {
        self.platform = platform;
    }

    pub fn next_platform(&mut self) {
        self.platform = self.platform.next();
    }

    /// The query to submit, or `None` when there is nothing but whitespace.
    pub fn submittable_query(&self) -> Option<String> {
        let trimmed = self.query.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
