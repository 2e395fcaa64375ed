//! Conversation history and its persistence.

use anyhow::{Context, Result};

use crate::state::{ChatMessage, ChatRole};
use crate::storage::KeyValueStore;

/// Storage key holding the serialized conversation
pub const HISTORY_KEY: &str = "mopraChatHistory";

/// Append-only list of messages, persisted as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    revision: u64,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the persisted conversation. A missing key is a first run and yields
    /// an empty history; unreadable content is an error.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(raw) = store.get(HISTORY_KEY)? else {
            return Ok(Self::new());
        };

        let messages: Vec<ChatMessage> = serde_json::from_str(&raw)
            .context("Saved chat history is malformed")?;

        Ok(Self {
            messages,
            revision: 0,
        })
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(&self.messages)?;
        store.set(HISTORY_KEY, &raw)
    }

    /// Stamp and append a message, returning a reference to it.
    pub fn append(&mut self, role: ChatRole, content: impl Into<String>, model: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage::new(role, content, model));
        self.revision += 1;
        // Just pushed
        &self.messages[self.messages.len() - 1]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.revision += 1;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Changes on every append or clear; front ends compare it to know when
    /// to rebuild the transcript and pin the scroll to the bottom.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_load_missing_is_empty() {
        let store = MemoryStore::new();
        let history = ConversationHistory::load(&store).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_load_malformed_is_error() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "{\"role\":").unwrap();
        assert!(ConversationHistory::load(&store).is_err());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let mut store = MemoryStore::new();
        let mut history = ConversationHistory::new();
        history.append(ChatRole::User, "first", "phi3");
        history.append(ChatRole::Ai, "second\nline", "phi3");
        history.append(ChatRole::Ai, "Error: boom", "system");
        history.save(&mut store).unwrap();

        let loaded = ConversationHistory::load(&store).unwrap();
        assert_eq!(loaded.messages(), history.messages());
    }

    #[test]
    fn test_revision_moves_on_change() {
        let mut history = ConversationHistory::new();
        let r0 = history.revision();
        history.append(ChatRole::User, "hi", "phi3");
        let r1 = history.revision();
        history.clear();
        assert!(r1 > r0);
        assert!(history.revision() > r1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_reads_browser_style_json() {
        let mut store = MemoryStore::new();
        store
            .set(
                HISTORY_KEY,
                r#"[{"role":"user","content":"Hello","model":"phi3","timestamp":"2024-05-01T10:00:00.000Z"}]"#,
            )
            .unwrap();

        let history = ConversationHistory::load(&store).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].role, ChatRole::User);
        assert_eq!(history.messages()[0].content, "Hello");
    }
}
