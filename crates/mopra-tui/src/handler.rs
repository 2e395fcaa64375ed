use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mopra_core::UiAction;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Line editing shared by the prompt box and the search field.
/// Returns `false` when the key is not an editing key.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(text.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = text.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Completion(completion) => app.controller.apply(completion),
    }
    app.follow_transcript();
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popups take the keyboard, topmost first
    if app.controller.alert().is_some() {
        handle_alert(app, key);
    } else if app.controller.confirmation().is_some() {
        handle_confirmation(app, key);
    } else if app.show_model_picker {
        handle_model_picker(app, key);
    } else if app.controller.memory().open {
        handle_memory_panel(app, key);
    } else if app.controller.search().open {
        handle_search_panel(app, key);
    } else {
        match app.input_mode {
            InputMode::Normal => handle_normal_mode(app, key),
            InputMode::Editing => handle_editing_mode(app, key),
        }
    }
}

fn handle_alert(app: &mut App, key: KeyEvent) {
    if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
        app.controller.dispatch(UiAction::DismissAlert);
    }
}

fn handle_confirmation(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            app.controller.dispatch(UiAction::Confirm)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.controller.dispatch(UiAction::Cancel)
        }
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => {
            if let Some(model) = app.pick_model() {
                app.controller.dispatch(UiAction::SelectModel(model));
            }
        }
        _ => {}
    }
}

fn handle_memory_panel(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('m') => {
            app.controller.dispatch(UiAction::CloseMemory)
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_memory_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_memory_up(),
        KeyCode::Char('r') => {
            app.memory_scroll = 0;
            app.controller.dispatch(UiAction::RefreshMemory);
        }
        KeyCode::Char('C') => app.controller.dispatch(UiAction::ClearMemory),
        _ => {}
    }
}

fn handle_search_panel(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.controller.dispatch(UiAction::CloseSearch),
        KeyCode::Enter => app.controller.dispatch(UiAction::SubmitSearch),
        KeyCode::Tab => app.controller.dispatch(UiAction::NextPlatform),
        _ => {
            let panel = app.controller.search_mut();
            edit_line(&mut panel.query, &mut panel.cursor, key);
        }
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') => app.chat_scroll = 0,

        // Only meaningful while a request is live
        KeyCode::Char('s') => {
            if app.controller.can_stop() {
                app.controller.dispatch(UiAction::Stop);
            }
        }
        KeyCode::Char('S') => app.controller.dispatch(UiAction::StopAll),
        KeyCode::Char('o') => app.controller.dispatch(UiAction::OptimizeResources),
        KeyCode::Char('C') => app.controller.dispatch(UiAction::ClearHistory),
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('f') | KeyCode::Char('/') => app.controller.dispatch(UiAction::OpenSearch),
        KeyCode::Char('m') => {
            app.memory_scroll = 0;
            app.controller.dispatch(UiAction::OpenMemory);
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            if !app.input.trim().is_empty() {
                let prompt = app.take_input();
                app.controller.dispatch(UiAction::SendPrompt(prompt));
                app.input_mode = InputMode::Normal;
            }
        }
        _ => {
            edit_line(&mut app.input, &mut app.input_cursor, key);
        }
    }
}
