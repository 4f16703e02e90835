//! Display regions written by the pollers, and the terminal implementation.

use std::io::Write;

use async_trait::async_trait;

use crate::{api::ParticipantRecord, error::ClientError, formatter::ScreenFormatter, router::Navigator};

/// Region showing the remaining seconds of a question
pub trait CountdownDisplay: Send + Sync {
    /// Replace the countdown text
    fn show_remaining(&self, remaining: u32);

    /// Tell the user the answered-signal can no longer be read
    fn show_sync_lost(&self, consecutive_failures: u32);
}

/// Region showing the participants of the game
pub trait ParticipantsDisplay: Send + Sync {
    /// Replace the whole list with `participants`
    fn replace(&self, participants: &[ParticipantRecord]);

    /// Tell the user the list stopped updating
    fn show_failure(&self, error: &ClientError);
}

/// Writes every region to stdout
#[derive(Debug, Clone, Default)]
pub struct TerminalDisplay {
    current_alias: Option<String>,
}

impl TerminalDisplay {
    /// Create a terminal display
    ///
    /// # Arguments
    ///
    /// * `current_alias` - Alias highlighted in the participant list
    pub fn new(current_alias: Option<String>) -> Self {
        Self { current_alias }
    }
}

fn print_flush(text: &str) {
    print!("{}", text);
    std::io::stdout().flush().ok();
}

impl CountdownDisplay for TerminalDisplay {
    fn show_remaining(&self, remaining: u32) {
        print_flush(&ScreenFormatter::format_countdown(remaining));
    }

    fn show_sync_lost(&self, consecutive_failures: u32) {
        print_flush(&ScreenFormatter::format_sync_lost(consecutive_failures));
    }
}

impl ParticipantsDisplay for TerminalDisplay {
    fn replace(&self, participants: &[ParticipantRecord]) {
        print_flush(&ScreenFormatter::format_participants(
            participants,
            self.current_alias.as_deref(),
        ));
    }

    fn show_failure(&self, error: &ClientError) {
        print_flush(&ScreenFormatter::format_polling_failed(&error.to_string()));
    }
}

#[async_trait]
impl Navigator for TerminalDisplay {
    async fn navigate(&self, target: &str) {
        tracing::info!("Navigating to {}", target);
        print_flush(&ScreenFormatter::format_navigation(target));
    }
}
