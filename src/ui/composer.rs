use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::ui::commands::{parse_slash_command, SlashCommand};

pub const PLACEHOLDER: &str = "You are talking to an AI, ask any question.";

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(SlashCommand),
    Edited,
    None,
}

/// Single-line question input
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    content: String,
    /// Cursor position in characters
    cursor: usize,
    placeholder: String,
    busy: bool,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            placeholder: placeholder.into(),
            busy: false,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if self.busy {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if self.content.trim().is_empty() {
                    return ComposerResult::None;
                }
                let content = std::mem::take(&mut self.content);
                self.cursor = 0;
                match parse_slash_command(&content) {
                    Some(command) => ComposerResult::Command(command),
                    None => ComposerResult::Submitted(content.trim().to_string()),
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_str(&c.to_string());
                ComposerResult::Edited
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return ComposerResult::None;
                }
                self.cursor -= 1;
                let at = self.byte_index();
                self.content.remove(at);
                ComposerResult::Edited
            }
            KeyCode::Delete => {
                if self.cursor >= self.char_count() {
                    return ComposerResult::None;
                }
                let at = self.byte_index();
                self.content.remove(at);
                ComposerResult::Edited
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                ComposerResult::None
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                ComposerResult::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                ComposerResult::None
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                ComposerResult::None
            }
            _ => ComposerResult::None,
        }
    }

    /// Insert pasted text at the cursor; line breaks become spaces
    pub fn paste(&mut self, text: &str) -> ComposerResult {
        if self.busy || text.is_empty() {
            return ComposerResult::None;
        }
        let flattened: String = text
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        self.insert_str(&flattened);
        ComposerResult::Edited
    }

    fn insert_str(&mut self, text: &str) {
        let at = self.byte_index();
        self.content.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Lock input while a turn is in flight
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.busy { "Waiting for answer..." } else { "Ask" };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(if !self.busy {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
            return;
        }

        // Keep the cursor visible on long input
        let width = inner_area.width.saturating_sub(1) as usize;
        let skip = self.cursor.saturating_sub(width);
        let mut visible: String = self.content.chars().skip(skip).collect();
        if !self.busy {
            let cursor_at = visible
                .char_indices()
                .nth(self.cursor - skip)
                .map(|(i, _)| i)
                .unwrap_or(visible.len());
            visible.insert(cursor_at, '▌');
        }

        let line = Line::from(vec![Span::raw(visible)]);
        buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
    }
}
