//! Cancellable polling with bounded retries.
//!
//! Used wherever the engine has to wait on an external system to reach some state (e.g. a freshly paired card reader
//! becoming ready). The probe is called up to `max_attempts` times. Between attempts the helper sleeps for the
//! current delay, which is multiplied by `backoff_factor` after every attempt. The sleep is raced against a
//! [`CancellationToken`] so that callers can abandon the wait at any time.
use std::{fmt::Display, future::Future, time::Duration};

use log::*;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay, backoff_factor: 1.0 }
    }

    pub fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff_factor = factor.max(1.0);
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff_factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(5))
    }
}

/// The result of a single probe.
#[derive(Debug)]
pub enum Probe<T, E> {
    Ready(T),
    NotReady,
    /// The probe failed, but a later attempt might succeed
    Transient(E),
    /// The probe failed and retrying is pointless
    Fatal(E),
}

#[derive(Debug)]
pub enum PollOutcome<T, E> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: Option<E> },
    Failed(E),
    Cancelled,
}

impl<T, E> PollOutcome<T, E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }
}

pub async fn poll_until_ready<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> PollOutcome<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe<T, E>>,
{
    let mut delay = policy.delay;
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        match probe(attempt).await {
            Probe::Ready(value) => {
                trace!("⏳️ Ready after {attempt} attempt(s)");
                return PollOutcome::Ready { value, attempts: attempt };
            },
            Probe::NotReady => {
                trace!("⏳️ Attempt {attempt}/{} not ready yet", policy.max_attempts);
            },
            Probe::Transient(e) => {
                debug!("⏳️ Attempt {attempt}/{} failed, will retry. {e}", policy.max_attempts);
                last_error = Some(e);
            },
            Probe::Fatal(e) => {
                warn!("⏳️ Attempt {attempt}/{} failed permanently. {e}", policy.max_attempts);
                return PollOutcome::Failed(e);
            },
        }
        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {},
            }
            delay = policy.next_delay(delay);
        }
    }
    PollOutcome::Exhausted { attempts: policy.max_attempts, last_error }
}
