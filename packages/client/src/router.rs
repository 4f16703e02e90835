//! Client route table and navigation.
//!
//! Two kinds of navigation exist:
//!
//! - in-app routes (`/`, `/guess`, `/waiting`) handled by [`Router`]
//! - full-page phase transitions (e.g. `/services/gamecountdown`) handed to a
//!   [`Navigator`]
//!
//! Loading a full page is what advances the game on the server, so the
//! navigator used by the host binary is [`ServerNavigator`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::api::GameService;

/// Full-page target reached when a question phase ends
pub const GAME_COUNTDOWN_PATH: &str = "/services/gamecountdown";

/// Views reachable through the client route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Enter a game code and alias
    JoinGame,
    /// Pick an answer for the current question
    Guess,
    /// Wait for the host to move the game along
    Waiting,
}

impl Route {
    /// Every route, in table order
    pub const ALL: [Route; 3] = [Route::JoinGame, Route::Guess, Route::Waiting];

    /// Resolve a URL path to its route
    ///
    /// # Returns
    ///
    /// `None` if the path is not in the route table
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    /// URL path of the route
    pub fn path(self) -> &'static str {
        match self {
            Route::JoinGame => "/",
            Route::Guess => "/guess",
            Route::Waiting => "/waiting",
        }
    }

    /// Route name
    pub fn name(self) -> &'static str {
        match self {
            Route::JoinGame => "Join-Game",
            Route::Guess => "GuessView",
            Route::Waiting => "WaitingView",
        }
    }
}

/// Tracks the current in-app route
#[derive(Debug, Clone)]
pub struct Router {
    current: Route,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            current: Route::JoinGame,
        }
    }
}

impl Router {
    /// Create a router positioned on the join view
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently displayed route
    pub fn current(&self) -> Route {
        self.current
    }

    /// Move to the route matching `path`.
    ///
    /// An unknown path leaves the current route untouched.
    pub fn push(&mut self, path: &str) -> Option<Route> {
        match Route::from_path(path) {
            Some(route) => {
                tracing::debug!("Route {} -> {}", self.current.path(), route.path());
                self.current = route;
                Some(route)
            }
            None => {
                tracing::warn!("No route matches '{}'", path);
                None
            }
        }
    }
}

/// Receiver of full-page navigations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Leave the current screen for `target`
    async fn navigate(&self, target: &str);
}

/// Server page path for a navigation target.
///
/// The server routes pages with a trailing slash.
pub fn page_path(target: &str) -> String {
    if target.ends_with('/') {
        target.to_string()
    } else {
        format!("{}/", target)
    }
}

/// Navigator that loads the target page on the game server, then hands the
/// navigation to a local navigator.
///
/// A failed page load is logged and recorded; the local navigation still
/// happens.
pub struct ServerNavigator {
    service: Arc<dyn GameService>,
    local: Arc<dyn Navigator>,
    visited: Mutex<Vec<String>>,
}

impl ServerNavigator {
    /// Create a navigator
    ///
    /// # Arguments
    ///
    /// * `service` - Game server, carrying the host session
    /// * `local` - Navigator updating the local screen
    pub fn new(service: Arc<dyn GameService>, local: Arc<dyn Navigator>) -> Self {
        Self {
            service,
            local,
            visited: Mutex::new(Vec::new()),
        }
    }

    /// Targets navigated to so far, in order
    pub async fn visited(&self) -> Vec<String> {
        self.visited.lock().await.clone()
    }
}

#[async_trait]
impl Navigator for ServerNavigator {
    async fn navigate(&self, target: &str) {
        let path = page_path(target);
        match self.service.open_page(&path).await {
            Ok(()) => tracing::info!("Server page {} loaded", path),
            Err(e) => tracing::error!("Failed to load server page {}: {}", path, e),
        }
        self.visited.lock().await.push(target.to_string());
        self.local.navigate(target).await;
    }
}
