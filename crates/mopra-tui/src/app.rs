use mopra_core::{model, ChatController, MemoryView, Transcript};
use ratatui::widgets::ListState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Rows one rendered line of `chars` characters takes at `width` columns.
fn line_rows(chars: usize, width: usize) -> usize {
    chars.div_ceil(width.max(1)).max(1)
}

/// Rows a block of text occupies when wrapped at `width` columns.
/// Empty text renders no lines at all.
pub fn wrapped_rows(text: &str, width: usize) -> usize {
    // Character count, not byte length, for UTF-8
    text.lines()
        .map(|line| line_rows(line.chars().count(), width))
        .sum()
}

/// Largest scroll offset that still shows the last row; `Paragraph::scroll` takes a u16.
fn max_scroll(rows: usize, visible_height: u16) -> u16 {
    let max = rows.saturating_sub(visible_height as usize);
    u16::try_from(max).unwrap_or(u16::MAX)
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub controller: ChatController,

    // Prompt input
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Transcript viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, updated during render
    pub chat_width: u16,  // inner width, updated during render
    /// (history revision, pending) at the last pin to the bottom
    pinned: (u64, bool),

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<&'static str>,
    pub model_picker_state: ListState,

    // Memory panel viewport
    pub memory_scroll: u16,
    pub memory_height: u16, // inner height, updated during render
    pub memory_width: u16,  // inner width, updated during render
}

impl App {
    pub fn new(controller: ChatController) -> Self {
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            controller,
            input: String::new(),
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            pinned: (u64::MAX, false),
            animation_frame: 0,
            show_model_picker: false,
            available_models: model::all(),
            model_picker_state: ListState::default(),
            memory_scroll: 0,
            memory_height: 0,
            memory_width: 0,
        };
        app.follow_transcript();
        app
    }

    pub fn tick_animation(&mut self) {
        if self.controller.can_stop() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Take the prompt input, leaving it empty.
    pub fn take_input(&mut self) -> String {
        self.input_cursor = 0;
        std::mem::take(&mut self.input)
    }

    /// Pin the transcript to the bottom whenever it changed since the last pin.
    pub fn follow_transcript(&mut self) {
        let current = (
            self.controller.history().revision(),
            self.controller.can_stop(),
        );
        if current != self.pinned {
            self.pinned = current;
            self.scroll_chat_to_bottom();
        }
    }

    /// Total rendered rows of the transcript at the current width
    pub fn transcript_rows(&self) -> usize {
        // Fall back to a sane width before the first render
        let width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };

        match self.controller.transcript() {
            Transcript::Placeholder(_) => 1,
            Transcript::Messages { messages, pending } => {
                let mut rows = 0;
                for msg in messages {
                    rows += 1; // Role line
                    rows += wrapped_rows(&msg.content, width);
                    rows += 1; // Blank line after message
                }
                if pending {
                    rows += 2; // "AI" + "Thinking..."
                }
                rows
            }
        }
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = max_scroll(self.transcript_rows(), visible_height);
    }

    pub fn scroll_chat_down(&mut self) {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        let max = max_scroll(self.transcript_rows(), visible_height);
        self.chat_scroll = self.chat_scroll.saturating_add(1).min(max);
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Total rendered rows of the memory panel body
    pub fn memory_rows(&self) -> usize {
        let width = if self.memory_width > 0 { self.memory_width as usize } else { 76 };

        match &self.controller.memory().view {
            MemoryView::Loading | MemoryView::Empty => 1,
            MemoryView::Error(message) => line_rows(message.chars().count(), width),
            MemoryView::Entries(entries) => entries
                .iter()
                .map(|entry| {
                    let prompt = line_rows("Prompt: ".len() + entry.prompt.chars().count(), width);
                    // Timestamp, prompt, "Response:", body, blank line
                    1 + prompt + 1 + wrapped_rows(&entry.response, width) + 1
                })
                .sum(),
        }
    }

    pub fn scroll_memory_down(&mut self) {
        let visible_height = if self.memory_height > 0 { self.memory_height } else { 20 };
        let max = max_scroll(self.memory_rows(), visible_height);
        self.memory_scroll = self.memory_scroll.saturating_add(1).min(max);
    }

    pub fn scroll_memory_up(&mut self) {
        self.memory_scroll = self.memory_scroll.saturating_sub(1);
    }

    pub fn open_model_picker(&mut self) {
        let current_idx = self
            .available_models
            .iter()
            .position(|m| *m == self.controller.selected_model())
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Close the picker, returning the highlighted model id.
    pub fn pick_model(&mut self) -> Option<String> {
        self.show_model_picker = false;
        self.model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .map(|m| m.to_string())
    }
}
