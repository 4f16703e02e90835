//! Participant list refresher for the host's waiting screen.
//!
//! Reads are chained: the next read is scheduled only after the previous one
//! completed, so a slow server naturally spaces the reads out.

use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    api::{GameService, PARTICIPANTS_PATH},
    display::ParticipantsDisplay,
    error::ClientError,
    retry::RetryPolicy,
};

/// Default delay between the end of one read and the start of the next
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_secs(2);

/// Keeps the participants display in sync with the server
pub struct ParticipantRefresher {
    service: Arc<dyn GameService>,
    display: Arc<dyn ParticipantsDisplay>,
    policy: RetryPolicy,
}

impl ParticipantRefresher {
    /// Create a refresher with the default delay and retry policy
    pub fn new(service: Arc<dyn GameService>, display: Arc<dyn ParticipantsDisplay>) -> Self {
        Self {
            service,
            display,
            policy: RetryPolicy::new(DEFAULT_REFRESH_DELAY),
        }
    }

    /// Override the retry policy; its base delay is the refresh delay
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Refresh until polling fails for good
    pub async fn run(self) -> Result<(), ClientError> {
        self.run_until(std::future::pending()).await
    }

    /// Refresh until `shutdown` resolves.
    ///
    /// A failed read is retried with backoff. Polling stops with an error,
    /// shown on the display, when a read fails in a way retrying cannot fix
    /// or when the policy's failure bound is reached.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ClientError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut consecutive_failures: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.service.fetch_participants() => result,
            };

            let delay = match result {
                Ok(participants) => {
                    if consecutive_failures > 0 {
                        tracing::info!(
                            "Participant list recovered after {} failed reads",
                            consecutive_failures
                        );
                    }
                    consecutive_failures = 0;
                    tracing::debug!("Participant list has {} entries", participants.len());
                    self.display.replace(&participants);
                    self.policy.backoff(0)
                }
                Err(e) if !e.is_transient() => {
                    tracing::error!("Participant list read failed permanently: {}", e);
                    self.display.show_failure(&e);
                    return Err(e);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        "Participant list read failed ({} in a row): {}",
                        consecutive_failures,
                        e
                    );

                    if self.policy.should_give_up(consecutive_failures) {
                        let error = ClientError::PollingAbandoned {
                            endpoint: PARTICIPANTS_PATH.to_string(),
                            attempts: consecutive_failures,
                        };
                        tracing::error!("{}", error);
                        self.display.show_failure(&error);
                        return Err(error);
                    }

                    self.policy.backoff(consecutive_failures)
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Participant refresher stopped");
        Ok(())
    }
}
