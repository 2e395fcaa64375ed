use mopra_core::controller::PENDING_TEXT;
use mopra_core::memory::{EMPTY_TEXT, LOADING_TEXT};
use mopra_core::search::{PLACEHOLDER_TEXT, SEARCHING_TEXT};
use mopra_core::{ChatRole, MemoryView, SearchPlatform, SearchView, Tone, Transcript};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, InputMode};

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Success => Color::Green,
        Tone::Warning => Color::Yellow,
        Tone::Danger => Color::Red,
        Tone::Secondary => Color::Gray,
    }
}

/// A `width` x `height` rectangle centered in `area`, shrunk to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Horizontal window over `text` that keeps `cursor` visible; returns the
/// visible slice and the cursor column within it.
fn visible_input(text: &str, cursor: usize, width: usize) -> (String, u16) {
    let scroll_offset = if width == 0 || cursor < width {
        0
    } else {
        cursor - width + 1
    };
    let visible = text.chars().skip(scroll_offset).take(width).collect();
    (visible, (cursor - scroll_offset) as u16)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups, lowest first so the most urgent ends up on top
    if app.controller.search().open {
        render_search_panel(app, frame, area);
    }
    if app.controller.memory().open {
        render_memory_panel(app, frame, area);
    }
    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
    if let Some(confirmation) = app.controller.confirmation() {
        render_dialog(frame, area, " Confirm ", confirmation.prompt(), "y/Enter yes  n/Esc no", Color::Yellow);
    }
    if let Some(alert) = app.controller.alert() {
        render_dialog(frame, area, " Error ", alert, "Enter dismiss", Color::Red);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = app.controller.status();

    let title = Line::from(vec![
        Span::styled(" Mopra ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(app.controller.model_label().to_string(), Style::default().fg(Color::White).bold()),
        Span::styled(
            format!(" ({}) ", app.controller.selected_model()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(
            format!(" {} ", status.label()),
            Style::default().bg(tone_color(status.tone())).fg(Color::Black).bold(),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let text = match app.controller.transcript() {
        Transcript::Placeholder(placeholder) => Text::from(Span::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        )),
        Transcript::Messages { messages, pending } => {
            let mut lines: Vec<Line> = Vec::new();

            for msg in messages {
                let time = Span::styled(
                    format!("  {}", msg.local_time()),
                    Style::default().fg(Color::DarkGray),
                );
                match msg.role {
                    ChatRole::User => {
                        lines.push(Line::from(vec![
                            Span::styled("You", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                            time,
                        ]));
                        for line in msg.content.lines() {
                            lines.push(Line::from(line.to_string()));
                        }
                    }
                    ChatRole::Ai => {
                        lines.push(Line::from(vec![
                            Span::styled("AI", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                            Span::styled(format!(" · {}", msg.model), Style::default().fg(Color::DarkGray)),
                            time,
                        ]));
                        let style = if msg.is_system() {
                            Style::default().fg(Color::Red).add_modifier(Modifier::ITALIC)
                        } else {
                            Style::default()
                        };
                        for line in msg.content.lines() {
                            lines.push(Line::styled(line.to_string(), style));
                        }
                    }
                }
                lines.push(Line::default());
            }

            if pending {
                lines.push(Line::from(Span::styled(
                    "AI",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                // Animated ellipsis: cycles through ".", "..", "..."
                let base = PENDING_TEXT.trim_end_matches('.');
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("{}{}", base, dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }

            Text::from(lines)
        }
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = visible_input(&app.input, app.input_cursor, inner_width);

    // Cyan to match the "You" label
    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    let popup_open = app.controller.search().open
        || app.controller.memory().open
        || app.show_model_picker
        || app.controller.confirmation().is_some()
        || app.controller.alert().is_some();
    if editing && !popup_open {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = if app.controller.search().open {
        vec![("Enter", "search"), ("Tab", "platform"), ("Esc", "close")]
    } else if app.controller.memory().open {
        vec![("j/k", "scroll"), ("r", "refresh"), ("C", "clear memory"), ("Esc", "close")]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![("Enter", "send"), ("Esc", "stop typing")],
            InputMode::Normal => {
                let mut pairs = vec![("i", "type")];
                if app.controller.can_stop() {
                    pairs.push(("s", "stop"));
                }
                pairs.extend([
                    ("o", "optimize RAM"),
                    ("f", "search"),
                    ("m", "memory"),
                    ("M", "model"),
                    ("C", "clear"),
                    ("j/k", "scroll"),
                    ("q", "quit"),
                ]);
                pairs
            }
        }
    };

    let hints = pairs.into_iter().flat_map(|(key, label)| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_search_panel(app: &App, frame: &mut Frame, area: Rect) {
    let search = app.controller.search();
    let popup_area = centered(area, 70, 20);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Online Search ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [platforms_area, query_area, result_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    // Platform selector: exactly one highlighted
    let platforms: Vec<Span> = SearchPlatform::all()
        .into_iter()
        .flat_map(|platform| {
            let style = if platform == search.platform {
                Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            [Span::styled(format!(" {} ", platform.display_name()), style), Span::raw(" ")]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(platforms)), platforms_area);

    let query_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Query ");
    let inner_width = query_area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = visible_input(&search.query, search.cursor, inner_width);
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)).block(query_block),
        query_area,
    );

    let result = match &search.view {
        SearchView::Placeholder => Text::from(Span::styled(PLACEHOLDER_TEXT, Style::default().fg(Color::DarkGray))),
        SearchView::Searching => Text::from(Span::styled(SEARCHING_TEXT, Style::default().fg(Color::Yellow))),
        SearchView::Error(message) => Text::from(Span::styled(message.as_str(), Style::default().fg(Color::Red))),
        SearchView::Results { platform, content } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    SearchView::results_heading(*platform),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
                Line::default(),
            ];
            lines.extend(content.lines().map(|l| Line::from(l.to_string())));
            Text::from(lines)
        }
    };
    frame.render_widget(Paragraph::new(result).wrap(Wrap { trim: false }), result_area);

    let topmost = !app.controller.memory().open
        && !app.show_model_picker
        && app.controller.confirmation().is_none()
        && app.controller.alert().is_none();
    if topmost {
        frame.set_cursor_position((query_area.x + cursor_x + 1, query_area.y + 1));
    }
}

fn render_memory_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 80, area.height.saturating_sub(4));
    frame.render_widget(Clear, popup_area);

    // Inner size for scroll calculations
    app.memory_height = popup_area.height.saturating_sub(2);
    app.memory_width = popup_area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Memory (newest first) ");

    let text = match &app.controller.memory().view {
        MemoryView::Loading => Text::from(Span::styled(LOADING_TEXT, Style::default().fg(Color::Yellow))),
        MemoryView::Empty => Text::from(Span::styled(EMPTY_TEXT, Style::default().fg(Color::DarkGray))),
        MemoryView::Error(message) => Text::from(Span::styled(message.as_str(), Style::default().fg(Color::Red))),
        MemoryView::Entries(entries) => {
            let mut lines: Vec<Line> = Vec::new();
            for entry in entries {
                lines.push(Line::from(Span::styled(
                    entry.local_timestamp(),
                    Style::default().fg(Color::DarkGray),
                )));
                lines.push(Line::from(vec![
                    Span::styled("Prompt: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                    Span::raw(entry.prompt.clone()),
                ]));
                lines.push(Line::from(Span::styled(
                    "Response:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                lines.extend(entry.response.lines().map(|l| Line::from(l.to_string())));
                lines.push(Line::default());
            }
            Text::from(lines)
        }
    };

    let body = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.memory_scroll, 0));
    frame.render_widget(body, popup_area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_height = app.available_models.len() as u16 + 2;
    let popup_area = centered(area, 40, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let selected = app.controller.selected_model().to_string();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|id| {
            let style = if *id == selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ({}) ", mopra_core::model::display_name(id), id)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

fn render_dialog(frame: &mut Frame, area: Rect, title: &str, message: &str, keys: &str, color: Color) {
    let popup_area = centered(area, 50, 6);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title.to_string());

    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled(keys.to_string(), Style::default().fg(Color::DarkGray))),
    ]);

    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup_area);
}
