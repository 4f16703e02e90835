//! Polling client for a live quiz game.
//!
//! Keeps a client in step with the game server:
//!
//! - `countdown`: ends a question phase when everybody answered or time ran out
//! - `refresher`: keeps the host's participant list current
//! - `router` / `session` / `views`: participant screens and their shared identity

// core
pub mod countdown;
pub mod refresher;
pub mod router;
pub mod session;
pub mod views;

// server access
pub mod api;
pub mod retry;

// shared
pub mod config;
pub mod display;
pub mod error;
pub mod formatter;

pub use api::{GameService, HttpGameService};
pub use config::ClientConfig;
pub use error::ClientError;
pub use session::SessionContext;
