use std::str::FromStr;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::events::AppEvent;

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Discard the conversation
    Clear,
    /// Expand or collapse source lists
    Sources,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "clear the chat and its context",
            SlashCommand::Sources => "show or hide the sources of each answer",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    pub fn event(self) -> AppEvent {
        match self {
            SlashCommand::Clear => AppEvent::ClearChat,
            SlashCommand::Sources => AppEvent::ToggleSources,
            SlashCommand::Help => AppEvent::ShowHelp,
            SlashCommand::Bye => AppEvent::Exit,
        }
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let head = input.trim().strip_prefix('/')?.split_whitespace().next()?;

    SlashCommand::from_str(&head.to_lowercase())
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "c" | "reset" => Some(SlashCommand::Clear),
            "s" | "src" => Some(SlashCommand::Sources),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }

    help.push_str("\nKeys: Enter send, Ctrl+L clear, Ctrl+S sources, PgUp/PgDn scroll, Esc exit");
    help.push_str("\nAliases: /q for /bye, /c for /clear, /s for /sources");

    help
}
