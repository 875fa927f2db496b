mod retry;

pub use retry::{poll_until_ready, PollOutcome, Probe, RetryPolicy};
