use anyhow::{bail, Result};

use crate::dispatcher::TurnDispatcher;
use crate::session::{AnswerRecord, ConversationSession};

/// Answer each question in order without entering the TUI.
pub async fn ask(session: &mut ConversationSession, questions: &[String]) -> Result<()> {
    println!("🤖 {}", session.backend().display_name());
    println!("{}", "=".repeat(50));

    let mut failed = 0;
    for question in questions {
        println!("❓ {}", question);
        match TurnDispatcher::submit(session, question).await {
            Ok(record) => {
                print!("{}", format_answer(record));
                if record.is_failed() {
                    failed += 1;
                }
            }
            Err(err) => {
                println!("❌ {}", err);
                failed += 1;
            }
        }
        println!();
    }

    if failed > 0 {
        bail!("{} of {} questions failed", failed, questions.len());
    }
    Ok(())
}

fn format_answer(record: &AnswerRecord) -> String {
    let mut out = String::new();
    if record.is_failed() {
        out.push_str(&format!("❌ {}\n", record.text()));
        return out;
    }

    out.push_str(&format!("💬 {}\n", record.text()));
    if !record.sources.is_empty() {
        out.push_str("📚 Sources:\n");
        for source in &record.sources {
            out.push_str(&format!("   • {}\n", source));
        }
    }
    out
}
