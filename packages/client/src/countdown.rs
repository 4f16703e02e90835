//! Countdown synchronizer for the question screen.
//!
//! One task races two conditions and ends the question phase on whichever
//! comes first:
//!
//! - the server reports that every participant answered
//! - the local countdown reaches zero
//!
//! Every tick issues one read of the answered-signal without waiting for it,
//! then advances the counter. Reads complete independently of the timer, so
//! a slow or failing server never delays the timeout.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    task::JoinSet,
    time::{Instant, MissedTickBehavior, interval_at},
};

use crate::{
    api::GameService,
    display::CountdownDisplay,
    error::ClientError,
    retry::RetryPolicy,
    router::{GAME_COUNTDOWN_PATH, Navigator},
};

/// Default countdown tick
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Elapsed ticks against a fixed limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    seconds_elapsed: u32,
    duration_limit: u32,
}

impl CountdownState {
    /// Start a countdown of `duration_limit` ticks
    pub fn new(duration_limit: u32) -> Self {
        Self {
            seconds_elapsed: 0,
            duration_limit,
        }
    }

    /// Count one tick and return the remaining ticks
    pub fn advance(&mut self) -> u32 {
        self.seconds_elapsed = self.seconds_elapsed.saturating_add(1);
        self.remaining()
    }

    /// `duration_limit - seconds_elapsed`, never below zero
    pub fn remaining(&self) -> u32 {
        self.duration_limit.saturating_sub(self.seconds_elapsed)
    }

    pub fn seconds_elapsed(&self) -> u32 {
        self.seconds_elapsed
    }

    pub fn duration_limit(&self) -> u32 {
        self.duration_limit
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == 0
    }
}

/// Why the question phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// The server reported every participant answered
    AllAnswered { at_tick: u32 },
    /// The countdown reached zero
    TimedOut { at_tick: u32 },
}

/// One-shot navigation to the next phase.
///
/// Only the first [`PhaseTransition::fire`] reaches the navigator.
pub struct PhaseTransition {
    fired: AtomicBool,
    target: String,
    navigator: Arc<dyn Navigator>,
}

impl PhaseTransition {
    /// Create a transition towards `target`
    pub fn new(navigator: Arc<dyn Navigator>, target: impl Into<String>) -> Self {
        Self {
            fired: AtomicBool::new(false),
            target: target.into(),
            navigator,
        }
    }

    /// Navigate unless already done
    ///
    /// # Returns
    ///
    /// `true` if this call performed the navigation
    pub async fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!("Transition to {} already fired, ignoring", self.target);
            return false;
        }
        self.navigator.navigate(&self.target).await;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Question screen synchronizer
pub struct CountdownSynchronizer {
    service: Arc<dyn GameService>,
    display: Arc<dyn CountdownDisplay>,
    transition: Arc<PhaseTransition>,
    duration_limit: u32,
    tick: Duration,
    failure_policy: RetryPolicy,
}

impl CountdownSynchronizer {
    /// Create a synchronizer navigating to the game countdown page when done
    ///
    /// # Arguments
    ///
    /// * `service` - Source of the answered-signal
    /// * `display` - Countdown region
    /// * `navigator` - Receives the phase transition
    /// * `duration_limit` - Number of ticks before the phase times out, read once here
    pub fn new(
        service: Arc<dyn GameService>,
        display: Arc<dyn CountdownDisplay>,
        navigator: Arc<dyn Navigator>,
        duration_limit: u32,
    ) -> Self {
        Self {
            service,
            display,
            transition: Arc::new(PhaseTransition::new(navigator, GAME_COUNTDOWN_PATH)),
            duration_limit,
            tick: DEFAULT_TICK,
            failure_policy: RetryPolicy::new(DEFAULT_TICK),
        }
    }

    /// Override the tick period
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Failed reads in a row before the display is told synchronization is lost
    pub fn with_max_consecutive_failures(mut self, max_consecutive_failures: u32) -> Self {
        self.failure_policy = self
            .failure_policy
            .with_max_consecutive_failures(max_consecutive_failures);
        self
    }

    /// Handle to the one-shot transition, usable after `run` consumed `self`
    pub fn transition(&self) -> Arc<PhaseTransition> {
        self.transition.clone()
    }

    /// Run until the phase ends, then navigate once.
    ///
    /// Reads still in flight when the phase ends are cancelled.
    pub async fn run(self) -> TransitionCause {
        let mut state = CountdownState::new(self.duration_limit);

        if state.is_expired() {
            tracing::info!("Countdown started with no time left");
            self.transition.fire().await;
            return TransitionCause::TimedOut { at_tick: 0 };
        }

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reads: JoinSet<Result<bool, ClientError>> = JoinSet::new();
        let mut consecutive_failures: u32 = 0;
        let mut sync_lost_reported = false;

        tracing::info!(
            "Countdown started: {} ticks of {:?}",
            state.duration_limit(),
            self.tick
        );

        let cause = loop {
            tokio::select! {
                biased;

                Some(joined) = reads.join_next() => {
                    let result = joined.unwrap_or_else(|e| {
                        Err(ClientError::Request {
                            endpoint: crate::api::CHECK_ALL_ANSWERED_PATH.to_string(),
                            message: e.to_string(),
                        })
                    });

                    match result {
                        Ok(true) => {
                            break TransitionCause::AllAnswered {
                                at_tick: state.seconds_elapsed(),
                            };
                        }
                        Ok(false) => {
                            consecutive_failures = 0;
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            tracing::warn!(
                                "Answered check failed ({} in a row): {}",
                                consecutive_failures,
                                e
                            );
                            if self.failure_policy.should_give_up(consecutive_failures)
                                && !sync_lost_reported
                            {
                                sync_lost_reported = true;
                                self.display.show_sync_lost(consecutive_failures);
                            }
                        }
                    }
                }

                _ = ticker.tick() => {
                    let service = self.service.clone();
                    reads.spawn(async move { service.check_all_answered().await });

                    let remaining = state.advance();
                    self.display.show_remaining(remaining);

                    if remaining == 0 {
                        break TransitionCause::TimedOut {
                            at_tick: state.seconds_elapsed(),
                        };
                    }
                }
            }
        };

        reads.abort_all();
        tracing::info!("Question phase ended: {:?}", cause);
        self.transition.fire().await;
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::MockGameService, router::MockNavigator};
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - CountdownState の残り時間計算
    // - PhaseTransition の一回限りの遷移
    // - CountdownSynchronizer の 2 つの遷移条件（全員回答・タイムアウト）
    //
    // 【なぜこのテストが必要か】
    // - 遷移は一度だけ実行されなければならない
    // - 回答チェックの失敗がタイムアウトを妨げてはならない
    //
    // 【どのようなシナリオをテストするか】
    // 1. タイムアウトによる遷移
    // 2. 全員回答による早期遷移
    // 3. 回答チェックの連続失敗
    // 4. 遷移の二重実行
    // ========================================

    #[derive(Default)]
    struct RecordingDisplay {
        remaining: Mutex<Vec<u32>>,
        sync_lost: Mutex<Vec<u32>>,
    }

    impl RecordingDisplay {
        fn remaining(&self) -> Vec<u32> {
            self.remaining.lock().unwrap().clone()
        }

        fn sync_lost(&self) -> Vec<u32> {
            self.sync_lost.lock().unwrap().clone()
        }
    }

    impl CountdownDisplay for RecordingDisplay {
        fn show_remaining(&self, remaining: u32) {
            self.remaining.lock().unwrap().push(remaining);
        }

        fn show_sync_lost(&self, consecutive_failures: u32) {
            self.sync_lost.lock().unwrap().push(consecutive_failures);
        }
    }

    fn navigator_expecting(times: usize) -> Arc<MockNavigator> {
        let mut navigator = MockNavigator::new();
        navigator
            .expect_navigate()
            .withf(|target| target.to_string() == GAME_COUNTDOWN_PATH)
            .times(times)
            .return_const(());
        Arc::new(navigator)
    }

    fn never_answered() -> Arc<MockGameService> {
        let mut service = MockGameService::new();
        service
            .expect_check_all_answered()
            .returning(|| Ok(false));
        Arc::new(service)
    }

    #[test]
    fn test_remaining_decreases_by_one_per_tick() {
        // テスト項目: 残り時間は 1 tick ごとに 1 ずつ減り、ちょうど上限回数で 0 になる
        for limit in [1u32, 5, 10, 60] {
            // given (前提条件):
            let mut state = CountdownState::new(limit);

            // when (操作):
            let sequence: Vec<u32> = (0..limit).map(|_| state.advance()).collect();

            // then (期待する結果):
            let expected: Vec<u32> = (0..limit).rev().collect();
            assert_eq!(sequence, expected);
            assert!(state.is_expired());
            assert_eq!(state.seconds_elapsed(), limit);
        }
    }

    #[test]
    fn test_remaining_never_underflows() {
        // テスト項目: 上限を超えて進めても残り時間は 0 のまま
        // given (前提条件):
        let mut state = CountdownState::new(1);
        state.advance();

        // when (操作):
        let remaining = state.advance();

        // then (期待する結果):
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_transition_fires_only_once() {
        // テスト項目: 遷移を 2 回呼んでも遷移先への移動は 1 回だけで、エラーにならない
        // given (前提条件):
        let transition = PhaseTransition::new(navigator_expecting(1), GAME_COUNTDOWN_PATH);

        // when (操作):
        let first = transition.fire().await;
        let second = transition.fire().await;

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(transition.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_duration_limit() {
        // テスト項目: 全員回答がない場合、上限 tick 数で 1 回だけ遷移し、タイマーが止まる
        // given (前提条件):
        let display = Arc::new(RecordingDisplay::default());
        let synchronizer =
            CountdownSynchronizer::new(never_answered(), display.clone(), navigator_expecting(1), 5);
        let transition = synchronizer.transition();

        // when (操作):
        let cause = synchronizer.run().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        // then (期待する結果):
        assert_eq!(cause, TransitionCause::TimedOut { at_tick: 5 });
        assert_eq!(display.remaining(), vec![4, 3, 2, 1, 0]);
        assert!(transition.has_fired());
        assert!(!transition.fire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_answered_ends_phase_early() {
        // テスト項目: 2 tick 目に全員回答が返ると、10 tick を待たずに 2 tick 目で遷移する
        // given (前提条件):
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut service = MockGameService::new();
        service
            .expect_check_all_answered()
            .returning(move || Ok(counter.fetch_add(1, Ordering::SeqCst) + 1 >= 2));
        let display = Arc::new(RecordingDisplay::default());
        let synchronizer = CountdownSynchronizer::new(
            Arc::new(service),
            display.clone(),
            navigator_expecting(1),
            10,
        );
        let started = Instant::now();

        // when (操作):
        let cause = synchronizer.run().await;

        // then (期待する結果):
        assert_eq!(cause, TransitionCause::AllAnswered { at_tick: 2 });
        assert_eq!(display.remaining(), vec![9, 8]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_checks_do_not_block_timeout() {
        // テスト項目: 回答チェックが失敗し続けてもタイムアウトで遷移し、同期喪失は 1 回だけ通知される
        // given (前提条件):
        let mut service = MockGameService::new();
        service.expect_check_all_answered().returning(|| {
            Err(ClientError::Request {
                endpoint: crate::api::CHECK_ALL_ANSWERED_PATH.to_string(),
                message: "connection refused".to_string(),
            })
        });
        let display = Arc::new(RecordingDisplay::default());
        let synchronizer = CountdownSynchronizer::new(
            Arc::new(service),
            display.clone(),
            navigator_expecting(1),
            6,
        )
        .with_max_consecutive_failures(3);

        // when (操作):
        let cause = synchronizer.run().await;

        // then (期待する結果):
        assert_eq!(cause, TransitionCause::TimedOut { at_tick: 6 });
        assert_eq!(display.sync_lost(), vec![3]);
        assert_eq!(display.remaining().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_failure_bound_reports_sync_lost_on_first_failure() {
        // テスト項目: 失敗上限 0 を指定すると最初の失敗で同期喪失が通知される
        // given (前提条件):
        let mut service = MockGameService::new();
        service.expect_check_all_answered().returning(|| {
            Err(ClientError::Request {
                endpoint: crate::api::CHECK_ALL_ANSWERED_PATH.to_string(),
                message: "timed out".to_string(),
            })
        });
        let display = Arc::new(RecordingDisplay::default());
        let synchronizer = CountdownSynchronizer::new(
            Arc::new(service),
            display.clone(),
            navigator_expecting(1),
            3,
        )
        .with_max_consecutive_failures(0);

        // when (操作):
        let cause = synchronizer.run().await;

        // then (期待する結果):
        assert_eq!(cause, TransitionCause::TimedOut { at_tick: 3 });
        assert_eq!(display.sync_lost(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_transitions_immediately() {
        // テスト項目: 残り時間 0 で開始した場合、tick を待たずに遷移する
        // given (前提条件):
        let mut service = MockGameService::new();
        service.expect_check_all_answered().times(0);
        let display = Arc::new(RecordingDisplay::default());
        let synchronizer =
            CountdownSynchronizer::new(Arc::new(service), display.clone(), navigator_expecting(1), 0);

        // when (操作):
        let cause = synchronizer.run().await;

        // then (期待する結果):
        assert_eq!(cause, TransitionCause::TimedOut { at_tick: 0 });
        assert!(display.remaining().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_tick_period() {
        // テスト項目: tick 間隔を変更するとその間隔で残り時間が進む
        // given (前提条件):
        let display = Arc::new(RecordingDisplay::default());
        let synchronizer =
            CountdownSynchronizer::new(never_answered(), display.clone(), navigator_expecting(1), 3)
                .with_tick(Duration::from_millis(250));
        let started = Instant::now();

        // when (操作):
        let cause = synchronizer.run().await;

        // then (期待する結果):
        assert_eq!(cause, TransitionCause::TimedOut { at_tick: 3 });
        assert_eq!(started.elapsed(), Duration::from_millis(750));
    }
}
