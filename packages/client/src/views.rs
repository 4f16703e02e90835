//! Participant-side screens: join, wait, guess.
//!
//! `QuizClient` performs the action of the current screen and moves the
//! router to the next one. Identity flows through the injected
//! [`SessionContext`].

use std::{sync::Arc, time::Duration};

use crate::{
    api::{GameService, GameState, JoinedParticipant, OpaqueId},
    error::ClientError,
    retry::RetryPolicy,
    router::{Route, Router},
    session::SessionContext,
};

/// Number of answers a question can have
pub const MAX_ANSWERS: u8 = 4;

/// Default delay between game lookups on the waiting screen
pub const DEFAULT_WAITING_POLL: Duration = Duration::from_secs(1);

/// Participant client driving the route shell
pub struct QuizClient {
    service: Arc<dyn GameService>,
    session: SessionContext,
    router: Router,
    waiting_policy: RetryPolicy,
    shown_question: Option<u32>,
    answered_question: Option<u32>,
}

impl QuizClient {
    /// Create a client positioned on the join screen
    ///
    /// # Arguments
    ///
    /// * `service` - Game server
    /// * `session` - Session identity shared with the other components
    pub fn new(service: Arc<dyn GameService>, session: SessionContext) -> Self {
        Self {
            service,
            session,
            router: Router::new(),
            waiting_policy: RetryPolicy::new(DEFAULT_WAITING_POLL),
            shown_question: None,
            answered_question: None,
        }
    }

    /// Override how the waiting screen polls the game
    pub fn with_waiting_policy(mut self, policy: RetryPolicy) -> Self {
        self.waiting_policy = policy;
        self
    }

    pub fn current_route(&self) -> Route {
        self.router.current()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Join a game and move to the waiting screen.
    ///
    /// The returned participant is stored in the session as-is.
    pub async fn join(
        &mut self,
        public_id: &OpaqueId,
        alias: &str,
    ) -> Result<JoinedParticipant, ClientError> {
        tracing::info!("Joining game {} as '{}'", public_id, alias);
        let participant = self.service.join_game(public_id, alias).await?;
        self.session.set_participant(&participant).await;
        self.router.push(Route::Waiting.path());
        Ok(participant)
    }

    /// Poll the game until an unanswered question is shown or the game is over.
    ///
    /// Moves to the guess screen when a question is shown; stays on the
    /// waiting screen once the leaderboard is reached. The question this
    /// client already answered does not count.
    pub async fn wait_for_question(&mut self) -> Result<GameState, ClientError> {
        let public_id = self.session.public_id().await.ok_or(ClientError::NotJoined)?;
        let mut consecutive_failures: u32 = 0;

        loop {
            match self.service.fetch_game(&public_id).await {
                Ok(game) => {
                    consecutive_failures = 0;
                    match game.state {
                        GameState::Question
                            if game.question_no.is_none()
                                || game.question_no != self.answered_question =>
                        {
                            self.shown_question = game.question_no;
                            self.router.push(Route::Guess.path());
                            return Ok(game.state);
                        }
                        GameState::Leaderboard => {
                            tracing::info!("Game {} is over", public_id);
                            return Ok(game.state);
                        }
                        GameState::Waiting | GameState::Question | GameState::Answer => {
                            tracing::debug!("Game {} is in state {}", public_id, game.state);
                        }
                    }
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        "Game lookup failed ({} in a row): {}",
                        consecutive_failures,
                        e
                    );
                    if self.waiting_policy.should_give_up(consecutive_failures) {
                        return Err(ClientError::PollingAbandoned {
                            endpoint: format!("/api/games/{}/", public_id),
                            attempts: consecutive_failures,
                        });
                    }
                }
            }

            tokio::time::sleep(self.waiting_policy.backoff(consecutive_failures)).await;
        }
    }

    /// Answer the current question and move back to the waiting screen
    ///
    /// # Errors
    ///
    /// - `ClientError::NotJoined` if the session lacks either id
    /// - `ClientError::Rejected` if `answer` is out of range or the server refuses it
    pub async fn guess(&mut self, answer: u8) -> Result<(), ClientError> {
        if answer >= MAX_ANSWERS {
            return Err(ClientError::Rejected(format!(
                "answer index {} is out of range (0..{})",
                answer, MAX_ANSWERS
            )));
        }

        let identity = self.session.identity().await;
        let (Some(public_id), Some(participant_id)) =
            (identity.public_id, identity.participant_id)
        else {
            return Err(ClientError::NotJoined);
        };

        self.service
            .submit_guess(&public_id, &participant_id, answer)
            .await?;
        tracing::info!("Answer {} submitted", answer);
        self.answered_question = self.shown_question;
        self.router.push(Route::Waiting.path());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GameSummary, MockGameService};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn game(state: GameState) -> GameSummary {
        GameSummary {
            public_id: OpaqueId::from(123456),
            state,
            countdown_time: Some(20),
            question_no: Some(0),
        }
    }

    fn joining_service() -> MockGameService {
        let mut service = MockGameService::new();
        service
            .expect_join_game()
            .times(1)
            .returning(|public_id, alias| {
                Ok(JoinedParticipant {
                    game: Some(public_id.clone()),
                    uuid_p: Some(OpaqueId::from("u-1")),
                    alias: Some(alias.to_string()),
                    points: Some(0),
                })
            });
        service
    }

    #[tokio::test]
    async fn test_join_stores_identity_and_moves_to_waiting() {
        // テスト項目: 参加に成功するとセッションに識別子が保存され、待機画面に遷移する
        // given (前提条件):
        let session = SessionContext::new();
        let mut client = QuizClient::new(Arc::new(joining_service()), session.clone());

        // when (操作):
        let result = client.join(&OpaqueId::from(123456), "bob").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(session.public_id().await, Some(OpaqueId::from(123456)));
        assert_eq!(session.participant_id().await, Some(OpaqueId::from("u-1")));
        assert_eq!(client.current_route(), Route::Waiting);
    }

    #[tokio::test]
    async fn test_rejected_join_stays_on_join_screen() {
        // テスト項目: 参加が拒否された場合、セッションは空のまま参加画面に留まる
        // given (前提条件):
        let mut service = MockGameService::new();
        service
            .expect_join_game()
            .returning(|public_id, _| {
                Err(ClientError::GameNotAcceptingParticipants(public_id.to_string()))
            });
        let session = SessionContext::new();
        let mut client = QuizClient::new(Arc::new(service), session.clone());

        // when (操作):
        let result = client.join(&OpaqueId::from(123456), "bob").await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::GameNotAcceptingParticipants(_))
        ));
        assert_eq!(session.public_id().await, None);
        assert_eq!(client.current_route(), Route::JoinGame);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_question_moves_to_guess() {
        // テスト項目: ゲームが問題表示状態になると回答画面に遷移する
        // given (前提条件):
        let mut service = joining_service();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        service.expect_fetch_game().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(game(GameState::Waiting))
            } else {
                Ok(game(GameState::Question))
            }
        });
        let mut client = QuizClient::new(Arc::new(service), SessionContext::new());
        client.join(&OpaqueId::from(123456), "bob").await.unwrap();

        // when (操作):
        let result = client.wait_for_question().await;

        // then (期待する結果):
        assert_eq!(result.unwrap(), GameState::Question);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.current_route(), Route::Guess);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_question_stops_at_leaderboard() {
        // テスト項目: ゲームが終了している場合は待機画面に留まって終了する
        // given (前提条件):
        let mut service = joining_service();
        service
            .expect_fetch_game()
            .returning(|_| Ok(game(GameState::Leaderboard)));
        let mut client = QuizClient::new(Arc::new(service), SessionContext::new());
        client.join(&OpaqueId::from(123456), "bob").await.unwrap();

        // when (操作):
        let result = client.wait_for_question().await;

        // then (期待する結果):
        assert_eq!(result.unwrap(), GameState::Leaderboard);
        assert_eq!(client.current_route(), Route::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_question_gives_up_after_failures() {
        // テスト項目: ゲーム取得の連続失敗が上限に達するとエラーを返す
        // given (前提条件):
        let mut service = joining_service();
        service.expect_fetch_game().times(2).returning(|_| {
            Err(ClientError::UnexpectedStatus {
                endpoint: "/api/games/123456/".to_string(),
                status: 502,
            })
        });
        let mut client = QuizClient::new(Arc::new(service), SessionContext::new())
            .with_waiting_policy(
                RetryPolicy::new(DEFAULT_WAITING_POLL).with_max_consecutive_failures(2),
            );
        client.join(&OpaqueId::from(123456), "bob").await.unwrap();

        // when (操作):
        let result = client.wait_for_question().await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::PollingAbandoned { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_for_question_requires_join() {
        // テスト項目: 参加前に待機するとエラーになる
        // given (前提条件):
        let mut client = QuizClient::new(Arc::new(MockGameService::new()), SessionContext::new());

        // when (操作):
        let result = client.wait_for_question().await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotJoined)));
    }

    #[tokio::test]
    async fn test_guess_submits_with_session_identity() {
        // テスト項目: 回答はセッションの識別子で送信され、待機画面に戻る
        // given (前提条件):
        let mut service = joining_service();
        service
            .expect_submit_guess()
            .times(1)
            .returning(|public_id, participant_id, answer| {
                assert_eq!(*public_id, OpaqueId::from(123456));
                assert_eq!(*participant_id, OpaqueId::from("u-1"));
                assert_eq!(answer, 2);
                Ok(())
            });
        let mut client = QuizClient::new(Arc::new(service), SessionContext::new());
        client.join(&OpaqueId::from(123456), "bob").await.unwrap();

        // when (操作):
        let result = client.guess(2).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(client.current_route(), Route::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_question_is_not_shown_again() {
        // テスト項目: 回答済みの問題では回答画面に戻らず、次の問題まで待機する
        // given (前提条件):
        let mut service = joining_service();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        service.expect_fetch_game().returning(move |_| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            let mut summary = game(GameState::Question);
            // first question until the fourth lookup, then the second question
            summary.question_no = Some(if call < 3 { 0 } else { 1 });
            Ok(summary)
        });
        service.expect_submit_guess().returning(|_, _, _| Ok(()));
        let mut client = QuizClient::new(Arc::new(service), SessionContext::new());
        client.join(&OpaqueId::from(123456), "bob").await.unwrap();
        client.wait_for_question().await.unwrap();
        client.guess(1).await.unwrap();

        // when (操作):
        let result = client.wait_for_question().await;

        // then (期待する結果):
        assert_eq!(result.unwrap(), GameState::Question);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(client.current_route(), Route::Guess);
    }

    #[tokio::test]
    async fn test_guess_out_of_range_is_rejected_locally() {
        // テスト項目: 範囲外の回答番号はサーバーに送信せずに拒否される
        // given (前提条件):
        let mut service = joining_service();
        service.expect_submit_guess().times(0);
        let mut client = QuizClient::new(Arc::new(service), SessionContext::new());
        client.join(&OpaqueId::from(123456), "bob").await.unwrap();

        // when (操作):
        let result = client.guess(MAX_ANSWERS).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_guess_without_participant_id_is_not_joined() {
        // テスト項目: 参加者 ID がないセッションでは回答できない
        // given (前提条件):
        let session = SessionContext::new();
        session
            .set_participant(&JoinedParticipant {
                game: Some(OpaqueId::from(123456)),
                ..Default::default()
            })
            .await;
        let mut client = QuizClient::new(Arc::new(MockGameService::new()), session);

        // when (操作):
        let result = client.guess(0).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotJoined)));
    }
}
