pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod memory;
pub mod model;
pub mod platform;
pub mod search;
pub mod state;
pub mod status;
pub mod storage;

// Re-export main types for convenience
pub use api::{Answer, MopraClient};
pub use config::Config;
pub use controller::{ChatController, Completion, Confirmation, Transcript, UiAction};
pub use error::{ApiError, ApiResult};
pub use history::ConversationHistory;
pub use memory::{MemoryEntry, MemoryPanel, MemoryView};
pub use platform::SearchPlatform;
pub use search::{SearchPanel, SearchView};
pub use state::{ChatMessage, ChatRole};
pub use status::{Status, StatusBadge, Tone};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
