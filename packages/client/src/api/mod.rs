//! Game server API: wire types and the service trait the pollers depend on.
//!
//! The pollers and views only see [`GameService`]; [`HttpGameService`] is the
//! implementation talking to the real server.

mod http;

use std::{convert::Infallible, fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub use http::{DEFAULT_REQUEST_TIMEOUT, HttpGameService};

/// Endpoint answering whether every participant answered the current question
pub const CHECK_ALL_ANSWERED_PATH: &str = "/services/checkAllAnswered/";
/// Endpoint listing the participants of the host's current game
pub const PARTICIPANTS_PATH: &str = "/services/gameUpdateParticipant/";
/// Endpoint removing a participant from the host's current game; the alias
/// is appended as the last path segment
pub const PARTICIPANT_REMOVE_PATH: &str = "/services/participantremove/";
/// Endpoint creating a participant
pub const JOIN_PATH: &str = "/api/participant/";
/// Endpoint creating a guess
pub const GUESS_PATH: &str = "/api/guess/";

/// Body returned by the status endpoint when everybody answered
pub const ALL_ANSWERED_SIGNAL: &str = "True";

/// Identifier the server hands out as either a JSON number or a string.
///
/// The client never interprets it, it only echoes it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpaqueId {
    Number(i64),
    Text(String),
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpaqueId::Number(n) => write!(f, "{}", n),
            OpaqueId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for OpaqueId {
    type Err = Infallible;

    /// Numeric text becomes a number, anything else is kept as text
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) => OpaqueId::Number(n),
            Err(_) => OpaqueId::Text(s.to_string()),
        })
    }
}

impl From<&str> for OpaqueId {
    fn from(value: &str) -> Self {
        OpaqueId::Text(value.to_string())
    }
}

impl From<String> for OpaqueId {
    fn from(value: String) -> Self {
        OpaqueId::Text(value)
    }
}

impl From<i64> for OpaqueId {
    fn from(value: i64) -> Self {
        OpaqueId::Number(value)
    }
}

/// One entry of the participant list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub alias: String,
    #[serde(default)]
    pub points: i64,
    #[serde(rename = "uuidP", default, skip_serializing_if = "Option::is_none")]
    pub uuid_p: Option<OpaqueId>,
}

/// Participant as returned by the join endpoint.
///
/// Both identity fields are optional: whatever the server sends is stored
/// as-is by the session context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedParticipant {
    #[serde(default)]
    pub game: Option<OpaqueId>,
    #[serde(rename = "uuidP", default)]
    pub uuid_p: Option<OpaqueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
}

/// Phase of a game on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GameState {
    /// Waiting for participants to join
    Waiting,
    /// A question is being shown
    Question,
    /// The correct answer of the last question is being shown
    Answer,
    /// Final leaderboard
    Leaderboard,
}

impl TryFrom<u8> for GameState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GameState::Waiting),
            2 => Ok(GameState::Question),
            3 => Ok(GameState::Answer),
            4 => Ok(GameState::Leaderboard),
            other => Err(format!("unknown game state {}", other)),
        }
    }
}

impl From<GameState> for u8 {
    fn from(state: GameState) -> Self {
        match state {
            GameState::Waiting => 1,
            GameState::Question => 2,
            GameState::Answer => 3,
            GameState::Leaderboard => 4,
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::Waiting => "WAITING",
            GameState::Question => "QUESTION",
            GameState::Answer => "ANSWER",
            GameState::Leaderboard => "LEADERBOARD",
        };
        f.write_str(name)
    }
}

/// Game as returned by the game lookup endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    #[serde(rename = "publicId")]
    pub public_id: OpaqueId,
    pub state: GameState,
    #[serde(rename = "countdownTime", default)]
    pub countdown_time: Option<u32>,
    #[serde(rename = "questionNo", default)]
    pub question_no: Option<u32>,
}

/// Request body of the join endpoint
#[derive(Debug, Clone, Serialize)]
pub struct JoinRequest<'a> {
    pub game: &'a OpaqueId,
    pub alias: &'a str,
}

/// Request body of the guess endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GuessRequest<'a> {
    pub game: &'a OpaqueId,
    pub uuidp: &'a OpaqueId,
    pub answer: u8,
}

/// Game server operations used by the client.
///
/// Implementations must be cheap to share across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameService: Send + Sync {
    /// Whether every participant has answered the current question
    async fn check_all_answered(&self) -> Result<bool, ClientError>;

    /// Current participants of the host's game
    async fn fetch_participants(&self) -> Result<Vec<ParticipantRecord>, ClientError>;

    /// Remove the participant named `alias` from the host's game.
    ///
    /// Removing an alias that is not in the game is not an error.
    async fn remove_participant(&self, alias: &str) -> Result<(), ClientError>;

    /// Load a server page for its side effect, discarding the body
    async fn open_page(&self, path: &str) -> Result<(), ClientError>;

    /// Join the game identified by `public_id` under `alias`
    async fn join_game(
        &self,
        public_id: &OpaqueId,
        alias: &str,
    ) -> Result<JoinedParticipant, ClientError>;

    /// Look up a game by its public id
    async fn fetch_game(&self, public_id: &OpaqueId) -> Result<GameSummary, ClientError>;

    /// Answer the current question with the answer at index `answer`
    async fn submit_guess(
        &self,
        public_id: &OpaqueId,
        participant_id: &OpaqueId,
        answer: u8,
    ) -> Result<(), ClientError>;
}

/// Interpret the status endpoint body.
///
/// Only the exact body `"True"` counts as affirmative; anything else,
/// including `"true"` or surrounding whitespace, does not.
pub fn is_all_answered_signal(body: &str) -> bool {
    body == ALL_ANSWERED_SIGNAL
}
