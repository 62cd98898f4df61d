// ── Run control and polling budgets ──
//
// Every wait and every device call in a run goes through `RunContext`,
// which races it against the run's cancellation token and optional
// deadline. Polling stages additionally bound themselves with a
// `PollBudget`, independent of the run deadline.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// How often and how many times a stage may poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollBudget {
    pub const fn new(interval: Duration, max_polls: u32) -> Self {
        Self {
            interval,
            max_polls,
        }
    }

    /// Role polling: every 10 s, at most 30 rounds.
    pub const fn roles() -> Self {
        Self::new(Duration::from_secs(10), 30)
    }

    /// Commit job polling: every 15 s, at most 40 polls.
    pub const fn commit() -> Self {
        Self::new(Duration::from_secs(15), 40)
    }

    /// HA sync polling: every 15 s, at most 8 polls.
    pub const fn sync() -> Self {
        Self::new(Duration::from_secs(15), 8)
    }

    /// Longest time spent waiting between polls.
    pub fn total_wait(&self) -> Duration {
        self.interval * self.max_polls.saturating_sub(1)
    }
}

/// Cancellation and deadline shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context whose deadline, if any, starts counting now.
    pub fn new(cancel: CancellationToken, deadline: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: deadline.map(|d| Instant::now() + d),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail if the run is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(CoreError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the run is cancelled or its deadline
    /// passes first. The future's own output, including its errors, is
    /// returned untouched.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, CoreError> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled),
            () = deadline => Err(CoreError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    /// Wait between polls.
    pub async fn pause(&self, wait: Duration) -> Result<(), CoreError> {
        self.guard(tokio::time::sleep(wait)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pause_completes_without_deadline() {
        let ctx = RunContext::new(CancellationToken::new(), None);
        let started = Instant::now();
        ctx.pause(Duration::from_secs(15)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_past_deadline_fails() {
        let ctx = RunContext::new(CancellationToken::new(), Some(Duration::from_secs(5)));
        let err = ctx.pause(Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, CoreError::DeadlineExceeded));
        assert!(matches!(ctx.check(), Err(CoreError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_pause() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone(), None);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let err = ctx.pause(Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
    }

    #[tokio::test]
    async fn guard_returns_inner_output() {
        let ctx = RunContext::new(CancellationToken::new(), None);
        let out: Result<u8, &str> = ctx.guard(async { Err("device said no") }).await.unwrap();
        assert_eq!(out, Err("device said no"));
    }

    #[tokio::test]
    async fn cancelled_run_never_starts_the_call() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RunContext::new(token, None);
        let err = ctx.guard(std::future::ready(1_u8)).await;
        assert!(matches!(err, Err(CoreError::Cancelled)));
    }

    #[test]
    fn default_budgets() {
        assert_eq!(PollBudget::roles().max_polls, 30);
        assert_eq!(PollBudget::commit().interval, Duration::from_secs(15));
        assert_eq!(PollBudget::sync().max_polls, 8);
        assert_eq!(PollBudget::sync().total_wait(), Duration::from_secs(105));
    }
}
