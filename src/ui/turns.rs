//! Turn list display component

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::session::{AnswerRecord, Turn};

/// Renders the display log, newest turn at the bottom
pub struct TurnList<'a> {
    turns: Vec<Turn<'a>>,
    pending: Option<&'a str>,
    show_sources: bool,
    /// Lines scrolled up from the bottom
    scroll: usize,
}

impl<'a> TurnList<'a> {
    pub fn new(turns: impl IntoIterator<Item = Turn<'a>>) -> Self {
        Self {
            turns: turns.into_iter().collect(),
            pending: None,
            show_sources: false,
            scroll: 0,
        }
    }

    /// Question currently waiting on the backend
    pub fn pending(mut self, question: Option<&'a str>) -> Self {
        self.pending = question;
        self
    }

    pub fn show_sources(mut self, show: bool) -> Self {
        self.show_sources = show;
        self
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// All lines for the current turns at the given width
    fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let text_width = width.saturating_sub(2) as usize;

        for turn in &self.turns {
            lines.extend(question_lines(
                &turn.question.question,
                &turn.question.asked_at.format("%H:%M:%S").to_string(),
                text_width,
            ));
            if let Some(answer) = turn.answer {
                lines.extend(self.answer_lines(answer, text_width));
            }
            lines.push(Line::from(""));
        }

        if let Some(question) = self.pending {
            lines.extend(question_lines(question, "", text_width));
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    "thinking...",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::ITALIC),
                ),
            ]));
        }

        lines
    }

    fn answer_lines(&self, answer: &AnswerRecord, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let style = if answer.is_failed() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        let label = if answer.is_failed() { "✗ " } else { "AI " };
        lines.push(Line::from(vec![Span::styled(
            label.to_string(),
            style.add_modifier(Modifier::BOLD),
        )]));
        for text in wrap_text(answer.text(), width) {
            lines.push(Line::from(vec![Span::raw("  "), Span::styled(text, style)]));
        }

        if answer.sources.is_empty() {
            return lines;
        }

        let dim = Style::default().fg(Color::DarkGray);
        if self.show_sources {
            lines.push(Line::from(vec![Span::styled("  ▾ Sources".to_string(), dim)]));
            for source in &answer.sources {
                lines.push(Line::from(vec![
                    Span::raw("    "),
                    Span::styled(source.clone(), Style::default().fg(Color::Cyan)),
                ]));
            }
        } else {
            lines.push(Line::from(vec![Span::styled(
                format!("  ▸ Sources ({})", answer.sources.len()),
                dim,
            )]));
        }

        lines
    }
}

fn question_lines(question: &str, timestamp: &str, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            "You ".to_string(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Span::styled(timestamp.to_string(), Style::default().fg(Color::DarkGray)),
    ])];
    for text in wrap_text(question, width) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(text, Style::default().fg(Color::Blue)),
        ]));
    }
    lines
}

/// Wrap text to fit within the given width, keeping paragraph breaks
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + word_width + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

impl Widget for TurnList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("Conversation");
        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.turns.is_empty() && self.pending.is_none() {
            let welcome = Line::from(vec![Span::styled(
                "Ask a question below. Type /help for commands.",
                Style::default().fg(Color::Gray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &welcome, inner_area.width);
            return;
        }

        let all_lines = self.lines(inner_area.width);

        // Anchor to the bottom, then step back by the scroll offset
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_scroll = total.saturating_sub(height);
        let end = total - self.scroll.min(max_scroll);
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}
