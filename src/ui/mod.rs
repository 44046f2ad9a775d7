//! Terminal front end: one chat screen over the current session.

pub mod chat;
pub mod commands;
pub mod composer;
pub mod turns;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info, warn};

use crate::dispatcher::TurnDispatcher;
use crate::events::{AppEvent, TuiEvent};
use crate::session::ConversationSession;
use chat::ChatScreen;

const TICK_RATE: Duration = Duration::from_millis(250);

/// Owns the terminal in raw mode and restores it on drop.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen, EnableBracketedPaste) {
            let _ = disable_raw_mode();
            return Err(err).context("Failed to enter alternate screen");
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .context("Failed to create terminal")?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableBracketedPaste
        );
        let _ = self.terminal.show_cursor();
    }
}

fn next_event() -> Result<TuiEvent> {
    if event::poll(TICK_RATE).context("Failed to poll terminal events")? {
        let raw = event::read().context("Failed to read terminal event")?;
        Ok(TuiEvent::from_crossterm(raw).unwrap_or(TuiEvent::Tick))
    } else {
        Ok(TuiEvent::Tick)
    }
}

/// Run the chat screen until the user exits.
pub async fn run(session: &mut ConversationSession, show_sources: bool) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;
    let mut screen = ChatScreen::new(show_sources);
    info!(session_id = %session.session_id(), "chat screen started");

    loop {
        guard
            .terminal
            .draw(|frame| screen.render(frame, session))
            .context("Failed to draw chat screen")?;

        let app_event = match next_event()? {
            TuiEvent::Key(key) => screen.handle_key(key),
            TuiEvent::Paste(text) => {
                screen.handle_paste(&text);
                None
            }
            TuiEvent::Resize(width, height) => {
                debug!(width, height, "terminal resized");
                None
            }
            TuiEvent::Tick => None,
        };
        session.set_input(screen.input());

        let Some(app_event) = app_event else {
            continue;
        };

        match app_event {
            AppEvent::Submit { question } => {
                screen.begin_turn(&question);
                guard
                    .terminal
                    .draw(|frame| screen.render(frame, session))
                    .context("Failed to draw chat screen")?;

                if let Err(err) = TurnDispatcher::submit(session, &question).await {
                    warn!(error = %err, "question rejected");
                }
                screen.end_turn();
            }
            AppEvent::ClearChat => {
                session.clear();
                screen.reset();
            }
            AppEvent::ToggleSources => screen.toggle_sources(),
            AppEvent::ShowHelp => screen.show_help(),
            AppEvent::Scroll(delta) => screen.scroll_by(delta),
            AppEvent::Exit => break,
        }
    }

    info!(
        session_id = %session.session_id(),
        turns = session.questions().len(),
        "chat screen closed"
    );
    Ok(())
}
