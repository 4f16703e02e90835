//! `GameService` implementation over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;

use crate::error::ClientError;

use super::{
    CHECK_ALL_ANSWERED_PATH, GUESS_PATH, GameService, GameSummary, GuessRequest, JOIN_PATH,
    JoinRequest, JoinedParticipant, OpaqueId, PARTICIPANT_REMOVE_PATH, PARTICIPANTS_PATH,
    ParticipantRecord, is_all_answered_signal,
};

/// Name of the server-side session cookie
const SESSION_COOKIE_NAME: &str = "sessionid";

/// Default bound on a single request, body included
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the game server
///
/// ## Fields
///
/// - `client`: shared connection pool
/// - `base_url`: server root, e.g. `http://127.0.0.1:8000`, always ending
///   with `/` so a path prefix such as `/kahoot/` is kept
/// - `session_cookie`: host session; the `/services/*` endpoints resolve the
///   game from it
#[derive(Debug, Clone)]
pub struct HttpGameService {
    client: Client,
    base_url: Url,
    session_cookie: Option<String>,
}

impl HttpGameService {
    /// Create a new service client rooted at `base_url` with the default
    /// request timeout
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidBaseUrl` if `base_url` is not an absolute URL
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_request_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new service client whose requests fail after `request_timeout`.
    ///
    /// A request that times out fails with the transient
    /// `ClientError::Request`, so pollers count it like any other failed read.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server root; endpoint paths are resolved below its path
    /// * `request_timeout` - Bound on connecting and on the whole request
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidBaseUrl` if `base_url` is not an absolute URL
    /// - `ClientError::HttpClient` if the HTTP client cannot be built
    pub fn with_request_timeout(
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut base_url =
            Url::parse(base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            session_cookie: None,
        })
    }

    /// Attach the host session cookie to every request
    pub fn with_session_cookie(mut self, session_cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(session_cookie.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ClientError::InvalidBaseUrl(format!("{}{}", self.base_url, path)))
    }

    fn participant_remove_url(&self, alias: &str) -> Result<Url, ClientError> {
        let mut url = self.url(PARTICIPANT_REMOVE_PATH)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(alias)
            .push("");
        Ok(url)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session_cookie {
            Some(value) => {
                request.header(header::COOKIE, format!("{}={}", SESSION_COOKIE_NAME, value))
            }
            None => request,
        }
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self
            .with_session(request)
            .send()
            .await
            .map_err(|e| ClientError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!("{} -> {}", endpoint, response.status());
        Ok(response)
    }

    async fn get(&self, path: &str) -> Result<Response, ClientError> {
        let url = self.url(path)?;
        let response = self.send(path, self.client.get(url)).await?;
        ensure_success(path, response)
    }
}

fn ensure_success(endpoint: &str, response: Response) -> Result<Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ClientError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: response.status().as_u16(),
        })
    }
}

async fn read_text(endpoint: &str, response: Response) -> Result<String, ClientError> {
    response.text().await.map_err(|e| {
        if e.is_timeout() {
            ClientError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        } else {
            ClientError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        }
    })
}

async fn read_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ClientError> {
    let body = read_text(endpoint, response).await?;
    serde_json::from_str(&body).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl GameService for HttpGameService {
    async fn check_all_answered(&self) -> Result<bool, ClientError> {
        let response = self.get(CHECK_ALL_ANSWERED_PATH).await?;
        let body = read_text(CHECK_ALL_ANSWERED_PATH, response).await?;
        Ok(is_all_answered_signal(&body))
    }

    async fn fetch_participants(&self) -> Result<Vec<ParticipantRecord>, ClientError> {
        let response = self.get(PARTICIPANTS_PATH).await?;
        read_json(PARTICIPANTS_PATH, response).await
    }

    async fn remove_participant(&self, alias: &str) -> Result<(), ClientError> {
        let url = self.participant_remove_url(alias)?;
        let endpoint = url.path().to_string();
        let response = self.send(&endpoint, self.client.get(url)).await?;
        ensure_success(&endpoint, response)?;
        tracing::info!("Participant '{}' removed", alias);
        Ok(())
    }

    async fn open_page(&self, path: &str) -> Result<(), ClientError> {
        self.get(path).await?;
        Ok(())
    }

    async fn join_game(
        &self,
        public_id: &OpaqueId,
        alias: &str,
    ) -> Result<JoinedParticipant, ClientError> {
        let url = self.url(JOIN_PATH)?;
        let body = JoinRequest {
            game: public_id,
            alias,
        };
        let response = self
            .send(JOIN_PATH, self.client.post(url).json(&body))
            .await?;

        match response.status() {
            StatusCode::FORBIDDEN => {
                let reason = read_text(JOIN_PATH, response).await.unwrap_or_default();
                tracing::warn!("Join rejected for game {}: {}", public_id, reason);
                Err(ClientError::GameNotAcceptingParticipants(public_id.to_string()))
            }
            StatusCode::BAD_REQUEST => {
                let reason = read_text(JOIN_PATH, response).await?;
                Err(ClientError::Rejected(reason))
            }
            _ => {
                let response = ensure_success(JOIN_PATH, response)?;
                read_json(JOIN_PATH, response).await
            }
        }
    }

    async fn fetch_game(&self, public_id: &OpaqueId) -> Result<GameSummary, ClientError> {
        let path = format!("/api/games/{}/", public_id);
        let response = self.get(&path).await?;
        read_json(&path, response).await
    }

    async fn submit_guess(
        &self,
        public_id: &OpaqueId,
        participant_id: &OpaqueId,
        answer: u8,
    ) -> Result<(), ClientError> {
        let url = self.url(GUESS_PATH)?;
        let body = GuessRequest {
            game: public_id,
            uuidp: participant_id,
            answer,
        };
        let response = self
            .send(GUESS_PATH, self.client.post(url).json(&body))
            .await?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                let reason = read_text(GUESS_PATH, response).await?;
                Err(ClientError::Rejected(reason))
            }
            _ => {
                ensure_success(GUESS_PATH, response)?;
                Ok(())
            }
        }
    }
}
