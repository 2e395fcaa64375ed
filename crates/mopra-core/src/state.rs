//! UI-agnostic chat state types
//!
//! These are shared by every front end and are exactly what gets persisted,
//! so the serde representation is part of the storage format.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Model tag used for messages the client produces itself (errors, stops).
pub const SYSTEM_MODEL: &str = "system";

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    pub fn new(role: ChatRole, content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            model: model.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.model == SYSTEM_MODEL
    }

    /// Local wall-clock time the message was created, as `HH:MM:SS`.
    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}
