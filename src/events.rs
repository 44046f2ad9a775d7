use crossterm::event::{Event, KeyEvent, KeyEventKind};

/// Actions the chat screen asks the application loop to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Dispatch a question to the backend
    Submit { question: String },

    /// Discard all turns and the context window
    ClearChat,

    /// Expand or collapse the source lists
    ToggleSources,

    /// Show the command reference
    ShowHelp,

    /// Scroll the turn list by a number of lines (positive is up)
    Scroll(i32),

    /// Request to exit the application
    Exit,
}

/// Terminal events the application loop reacts to
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key press event
    Key(KeyEvent),

    /// Paste event
    Paste(String),

    /// Terminal resize
    Resize(u16, u16),

    /// Nothing arrived before the poll timeout
    Tick,
}

impl TuiEvent {
    /// Map a raw crossterm event, dropping the ones the UI ignores
    pub fn from_crossterm(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(TuiEvent::Key(key)),
            Event::Paste(text) => Some(TuiEvent::Paste(text)),
            Event::Resize(width, height) => Some(TuiEvent::Resize(width, height)),
            _ => None,
        }
    }
}
