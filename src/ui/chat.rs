use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::events::AppEvent;
use crate::session::ConversationSession;
use crate::ui::commands::get_help_text;
use crate::ui::composer::{ComposerResult, ConversationComposer, PLACEHOLDER};
use crate::ui::turns::TurnList;

pub const TITLE: &str = "An AI App powered by Amazon Kendra and LLM Model!";

const SCROLL_STEP: i32 = 5;

/// Screen state that lives outside the session
pub struct ChatScreen {
    composer: ConversationComposer,
    show_sources: bool,
    scroll: usize,
    help: Option<String>,
    pending: Option<String>,
}

impl ChatScreen {
    pub fn new(show_sources: bool) -> Self {
        Self {
            composer: ConversationComposer::new(PLACEHOLDER),
            show_sources,
            scroll: 0,
            help: None,
            pending: None,
        }
    }

    /// Map a key press to an application event, feeding the composer otherwise
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AppEvent> {
        // Any key dismisses the help overlay
        if self.help.take().is_some() && key.code == KeyCode::Esc {
            return None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Some(AppEvent::Exit),
            KeyCode::Char('c') if ctrl => return Some(AppEvent::Exit),
            KeyCode::Char('l') if ctrl => return Some(AppEvent::ClearChat),
            KeyCode::Char('s') if ctrl => return Some(AppEvent::ToggleSources),
            KeyCode::PageUp => return Some(AppEvent::Scroll(SCROLL_STEP)),
            KeyCode::PageDown => return Some(AppEvent::Scroll(-SCROLL_STEP)),
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(question) => Some(AppEvent::Submit { question }),
            ComposerResult::Command(command) => Some(command.event()),
            ComposerResult::Edited | ComposerResult::None => None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.composer.paste(text);
    }

    /// Current composer text, mirrored into the session's pending input
    pub fn input(&self) -> &str {
        self.composer.content()
    }

    pub fn toggle_sources(&mut self) {
        self.show_sources = !self.show_sources;
    }

    pub fn show_help(&mut self) {
        self.help = Some(get_help_text());
    }

    pub fn scroll_by(&mut self, delta: i32) {
        self.scroll = if delta >= 0 {
            self.scroll.saturating_add(delta as usize)
        } else {
            self.scroll.saturating_sub(delta.unsigned_abs() as usize)
        };
    }

    /// Mark `question` as in flight and lock the composer
    pub fn begin_turn(&mut self, question: &str) {
        self.pending = Some(question.to_string());
        self.composer.set_busy(true);
        self.scroll = 0;
    }

    pub fn end_turn(&mut self) {
        self.pending = None;
        self.composer.set_busy(false);
    }

    /// Reset view state after the chat is cleared
    pub fn reset(&mut self) {
        self.composer.clear();
        self.scroll = 0;
        self.help = None;
    }

    pub fn render(&self, frame: &mut Frame, session: &ConversationSession) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Header
                Constraint::Min(5),    // Turns
                Constraint::Length(1), // Status
                Constraint::Length(3), // Composer
            ])
            .split(frame.size());

        frame.render_widget(header(session), chunks[0]);

        let turns = TurnList::new(session.turns())
            .pending(self.pending.as_deref())
            .show_sources(self.show_sources)
            .scroll(self.scroll);
        frame.render_widget(turns, chunks[1]);

        frame.render_widget(self.status_line(session), chunks[2]);
        frame.render_widget(&self.composer, chunks[3]);

        if let Some(help) = &self.help {
            let area = centered(chunks[1], 70, 12);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(help.as_str())
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title("Help")),
                area,
            );
        }
    }

    fn status_line(&self, session: &ConversationSession) -> Paragraph<'static> {
        let text = if self.pending.is_some() {
            format!("{} is thinking...", session.backend().display_name())
        } else {
            format!(
                "{} turns | context {}/{} | sources {} | /help",
                session.questions().len(),
                session.history().len(),
                session.history().capacity(),
                if self.show_sources { "shown" } else { "hidden" },
            )
        };
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )))
    }
}

fn header(session: &ConversationSession) -> Paragraph<'static> {
    let lines = vec![
        Line::from(Span::styled(
            format!("🤖 {}", TITLE),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw("Model: "),
            Span::styled(
                session.backend().display_name(),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!("  started {}", session.started_at().format("%Y-%m-%d %H:%M")),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    ];
    Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
