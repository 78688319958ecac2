use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use libtether_core::StartupPrompt;

/// Asks on the terminal; declines when stdin is not interactive
pub struct TerminalPrompt;

#[async_trait]
impl StartupPrompt for TerminalPrompt {
    async fn confirm(&self) -> bool {
        if !std::io::stdin().is_terminal() {
            return false;
        }

        tokio::task::spawn_blocking(|| {
            eprint!("Supervisor is not running. Start it now? [y/N] ");
            let _ = std::io::stderr().flush();
            let mut answer = String::new();
            if std::io::stdin().lock().read_line(&mut answer).is_err() {
                return false;
            }
            is_yes(&answer)
        })
        .await
        .unwrap_or(false)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
