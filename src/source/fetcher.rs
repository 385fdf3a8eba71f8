//! Remote retrieval of CMS archives
//!
//! A missing file is an expected condition near a period boundary, so the
//! fetcher never treats it as an error. Callers get a three-way outcome and
//! decide for themselves.

use crate::error::{PipelineError, Result};
use log::{debug, warn};
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::time::Duration;

/// Result of retrieving one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw payload
    Bytes(Vec<u8>),
    /// 404-class response: the file has not been published yet
    NotYetPublished,
    /// Network failure, timeout or server error
    Unreachable(String),
}

impl FetchOutcome {
    /// Convert into the pipeline error taxonomy
    pub fn into_result(self, url: &str) -> Result<Vec<u8>> {
        match self {
            FetchOutcome::Bytes(bytes) => Ok(bytes),
            FetchOutcome::NotYetPublished => Err(PipelineError::NotYetPublished(url.to_string())),
            FetchOutcome::Unreachable(reason) => Err(PipelineError::Unreachable {
                url: url.to_string(),
                reason,
            }),
        }
    }
}

/// Anything that can retrieve a resource identifier
///
/// Implementations must be shareable across the period fetch workers.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FetchOutcome;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, url: &str) -> FetchOutcome {
        (**self).fetch(url)
    }
}

/// How a response status maps onto a fetch outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    NotYetPublished,
    Unreachable,
}

/// 404 and 410 mean "not published"; every other failure is an outage
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        StatusClass::NotYetPublished
    } else {
        StatusClass::Unreachable
    }
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    if err.is_timeout() {
        message.insert_str(0, "timed out: ");
    }
    message
}

/// Single-attempt HTTP fetcher backed by a blocking reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Build a client with a bounded request timeout
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(err) => return FetchOutcome::Unreachable(format_reqwest_error(&err)),
        };

        let status = response.status();
        match classify_status(status) {
            StatusClass::Success => match response.bytes() {
                Ok(body) => {
                    debug!("Fetched {} ({} bytes)", url, body.len());
                    FetchOutcome::Bytes(body.to_vec())
                }
                Err(err) => FetchOutcome::Unreachable(format_reqwest_error(&err)),
            },
            StatusClass::NotYetPublished => FetchOutcome::NotYetPublished,
            StatusClass::Unreachable => FetchOutcome::Unreachable(format!("HTTP {}", status)),
        }
    }
}

/// Bounded retry schedule for `Unreachable` outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts (tests, local sources)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the given 1-based failed attempt
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Wraps a fetcher with bounded retries for transient failures
///
/// `NotYetPublished` is returned immediately; retrying a missing file only
/// adds load on the publisher.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch and report how many attempts were made
    pub fn fetch_counted(&self, url: &str) -> (FetchOutcome, u32) {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.fetch(url) {
                FetchOutcome::Unreachable(reason) if attempt < max_attempts => {
                    let delay = self.policy.backoff_after(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt, max_attempts, url, reason, delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                outcome => return (outcome, attempt),
            }
        }
    }
}

impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    fn fetch(&self, url: &str) -> FetchOutcome {
        self.fetch_counted(url).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes and counts calls
    struct ScriptedFetcher {
        script: Mutex<VecDeque<FetchOutcome>>,
        calls: Mutex<u32>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<FetchOutcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, _url: &str) -> FetchOutcome {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| FetchOutcome::Unreachable("script exhausted".into()))
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), StatusClass::Success);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), StatusClass::NotYetPublished);
        assert_eq!(classify_status(StatusCode::GONE), StatusClass::NotYetPublished);
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), StatusClass::Unreachable);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), StatusClass::Unreachable);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), StatusClass::Unreachable);
    }

    #[test]
    fn test_not_yet_published_is_not_retried() {
        let inner = ScriptedFetcher::new(vec![FetchOutcome::NotYetPublished]);
        let fetcher = RetryingFetcher::new(&inner, RetryPolicy::immediate(3));

        let (outcome, attempts) = fetcher.fetch_counted("u");
        assert_eq!(outcome, FetchOutcome::NotYetPublished);
        assert_eq!(attempts, 1);
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn test_unreachable_retried_up_to_limit() {
        let inner = ScriptedFetcher::new(vec![
            FetchOutcome::Unreachable("a".into()),
            FetchOutcome::Unreachable("b".into()),
            FetchOutcome::Unreachable("c".into()),
            FetchOutcome::Bytes(vec![1]),
        ]);
        let fetcher = RetryingFetcher::new(&inner, RetryPolicy::immediate(3));

        let (outcome, attempts) = fetcher.fetch_counted("u");
        assert_eq!(outcome, FetchOutcome::Unreachable("c".into()));
        assert_eq!(attempts, 3);
        assert_eq!(inner.calls(), 3);
    }

    #[test]
    fn test_transient_failure_recovers() {
        let inner = ScriptedFetcher::new(vec![
            FetchOutcome::Unreachable("reset".into()),
            FetchOutcome::Bytes(vec![7, 8]),
        ]);
        let fetcher = RetryingFetcher::new(&inner, RetryPolicy::immediate(3));

        assert_eq!(fetcher.fetch("u"), FetchOutcome::Bytes(vec![7, 8]));
        assert_eq!(inner.calls(), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(1));
    }

    #[test]
    fn test_outcome_into_result() {
        assert_eq!(FetchOutcome::Bytes(vec![1]).into_result("u").unwrap(), vec![1]);
        assert!(FetchOutcome::NotYetPublished
            .into_result("u")
            .unwrap_err()
            .is_expected_gap());
        let err = FetchOutcome::Unreachable("boom".into()).into_result("u").unwrap_err();
        assert_eq!(err.kind(), "unreachable");
    }
}
