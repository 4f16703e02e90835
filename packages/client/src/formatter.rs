//! Text rendering for the terminal screens.

use crate::api::{GameSummary, JoinedParticipant, ParticipantRecord};

const RULE: &str = "============================================================";

/// Formatter for everything the client prints
pub struct ScreenFormatter;

impl ScreenFormatter {
    /// Format the participant list
    ///
    /// # Arguments
    ///
    /// * `participants` - Participants in server order
    /// * `current_alias` - Alias of the local participant (marked as "me"), if any
    ///
    /// # Returns
    ///
    /// A formatted block with one line per participant
    pub fn format_participants(
        participants: &[ParticipantRecord],
        current_alias: Option<&str>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", RULE));
        output.push_str(&format!("Participants ({}):\n", participants.len()));

        if participants.is_empty() {
            output.push_str("(No participants yet)\n");
        } else {
            for participant in participants {
                let is_me = current_alias == Some(participant.alias.as_str());
                let me_suffix = if is_me { " (me)" } else { "" };
                output.push_str(&format!(
                    "{}{} - {} pts\n",
                    participant.alias, me_suffix, participant.points
                ));
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format the countdown line
    pub fn format_countdown(remaining: u32) -> String {
        format!("\r{:>3}s remaining", remaining)
    }

    /// Warning shown once the answered-signal has failed too often
    pub fn format_sync_lost(consecutive_failures: u32) -> String {
        format!(
            "\n! Lost contact with the game server ({} failed checks); waiting for the timer\n",
            consecutive_failures
        )
    }

    /// Error shown when a poller gives up
    pub fn format_polling_failed(reason: &str) -> String {
        format!("\n! Participant list is no longer updating: {}\n", reason)
    }

    /// Format a full-page navigation
    pub fn format_navigation(target: &str) -> String {
        format!("\n→ {}\n", target)
    }

    /// Format the result of a successful join
    pub fn format_joined(participant: &JoinedParticipant) -> String {
        let alias = participant.alias.as_deref().unwrap_or("?");
        let game = participant
            .game
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("Joined game {} as '{}'\n", game, alias)
    }

    /// Format a game lookup
    pub fn format_game(game: &GameSummary) -> String {
        let mut output = format!("Game {}: {}", game.public_id, game.state);
        if let Some(question_no) = game.question_no {
            output.push_str(&format!(", question #{}", question_no + 1));
        }
        if let Some(countdown) = game.countdown_time {
            output.push_str(&format!(", {}s per question", countdown));
        }
        output.push('\n');
        output
    }
}
