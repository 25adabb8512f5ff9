//! Retry with exponential backoff and jitter for study-service calls.
//!
//! Every call to the upstream AI service goes through [`with_retry`], which
//! re-runs a failed operation with exponentially growing, jittered delays.
//! Rate-limit responses (HTTP 429) carrying a `Retry-After` hint raise the
//! wait to at least the hinted duration.
//!
//! Observers are decoupled from the wrapper: progress is emitted as
//! [`RetryEvent`]s on an mpsc channel rather than invoked callbacks, so a
//! consumer (transcript, progress bar) can live on the other side of the
//! channel without the wrapper knowing about presentation.
//!
//! # Example
//!
//! ```rust,ignore
//! use seminar::retry::{with_retry, RetryPolicy};
//!
//! let policy = RetryPolicy::new().with_max_retries(3);
//! let urls = with_retry(&policy, || service.search("rust async", 1, 5)).await?;
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, SeminarError};

// ============================================================================
// Constants
// ============================================================================

/// Default total attempt budget (first try included).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Multiplier for exponential backoff.
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Upper bound on random jitter added to each delay, in milliseconds.
pub const DEFAULT_JITTER_BOUND_MS: u64 = 1000;

/// Retry-After value reported when a 429 response omits the header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// HTTP status codes retried by the default policy.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Attempt budget for the document-fetch profile.
pub const CONTENT_FETCH_MAX_RETRIES: u32 = 8;

/// Base delay for the document-fetch profile, in milliseconds.
pub const CONTENT_FETCH_BASE_DELAY_MS: u64 = 2000;

/// Maximum delay for the document-fetch profile, in milliseconds.
pub const CONTENT_FETCH_MAX_DELAY_MS: u64 = 60_000;

// ============================================================================
// Retry Events
// ============================================================================

/// Progress emitted by [`with_retry`] before each wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    /// A failed attempt will be retried after `delay`.
    ///
    /// `attempt` is 1-indexed: the first failure reports attempt 1.
    Attempt {
        attempt: u32,
        delay: Duration,
        error: String,
    },

    /// The service responded 429 on the given attempt.
    ///
    /// `retry_after` is the server's hint, or the 60-second default when the
    /// response omitted the header. Emitted for every observed 429, even when
    /// no further attempt remains.
    RateLimited { attempt: u32, retry_after: Duration },
}

type RetryPredicate = Arc<dyn Fn(&SeminarError) -> bool + Send + Sync>;

// ============================================================================
// Retry Policy
// ============================================================================

/// Policy governing [`with_retry`]: attempt budget, delay curve, which
/// failures are worth retrying, and where to report progress.
///
/// Immutable during a `with_retry` invocation. Cloning is cheap; the event
/// sender and predicate are shared handles.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts allowed, first try included.
    pub max_retries: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Hard cap applied after jitter.
    pub max_delay: Duration,
    /// Upper bound on the random jitter added to each delay.
    pub jitter_bound: Duration,
    /// HTTP status codes the default classification retries.
    pub retry_status_codes: HashSet<u16>,
    events: Option<UnboundedSender<RetryEvent>>,
    should_retry: Option<RetryPredicate>,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter_bound", &self.jitter_bound)
            .field("retry_status_codes", &self.retry_status_codes)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter_bound: Duration::from_millis(DEFAULT_JITTER_BOUND_MS),
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.into_iter().collect(),
            events: None,
            should_retry: None,
            cancellation: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The patient profile used for document fetching: more attempts,
    /// longer delays (8 attempts, 2 s base, 60 s cap).
    #[must_use]
    pub fn content_fetch() -> Self {
        Self {
            max_retries: CONTENT_FETCH_MAX_RETRIES,
            base_delay: Duration::from_millis(CONTENT_FETCH_BASE_DELAY_MS),
            max_delay: Duration::from_millis(CONTENT_FETCH_MAX_DELAY_MS),
            ..Self::default()
        }
    }

    /// Set the total attempt budget.
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter bound. `Duration::ZERO` makes delays deterministic.
    #[must_use]
    pub fn with_jitter_bound(mut self, bound: Duration) -> Self {
        self.jitter_bound = bound;
        self
    }

    /// Replace the set of retryable HTTP status codes.
    #[must_use]
    pub fn with_retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    /// Emit [`RetryEvent`]s on the given channel.
    #[must_use]
    pub fn with_events(mut self, sender: UnboundedSender<RetryEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Override retryability classification with a custom predicate.
    ///
    /// Cancellation is never retried, regardless of the predicate.
    #[must_use]
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SeminarError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Race backoff sleeps against the given cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Compute the backoff delay for a 0-indexed attempt with explicit jitter.
    ///
    /// `min(max_delay, base_delay * 2^attempt + jitter)`, with saturating
    /// arithmetic so large attempt numbers degrade to the cap.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32, jitter: Duration) -> Duration {
        let multiplier = BACKOFF_MULTIPLIER.saturating_pow(attempt);
        let exponential = ms(self.base_delay).saturating_mul(multiplier);
        let with_jitter = exponential.saturating_add(ms(jitter));
        Duration::from_millis(with_jitter.min(ms(self.max_delay)))
    }

    /// Compute the backoff delay for a 0-indexed attempt with fresh jitter.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_delay(attempt, self.sample_jitter())
    }

    fn sample_jitter(&self) -> Duration {
        let bound = ms(self.jitter_bound);
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }

    /// Whether the default classification would retry this error.
    ///
    /// Network-level failures (no status) are always retryable; anything
    /// carrying an HTTP status is retried only when the status is in
    /// `retry_status_codes`. Cancellation is never retried.
    #[must_use]
    pub fn default_should_retry(&self, error: &SeminarError) -> bool {
        match error {
            SeminarError::Cancelled => false,
            SeminarError::Transient { status: None, .. } => true,
            _ => error
                .status()
                .is_some_and(|status| self.retry_status_codes.contains(&status)),
        }
    }

    fn should_retry(&self, error: &SeminarError) -> bool {
        if error.is_cancelled() {
            return false;
        }
        match &self.should_retry {
            Some(predicate) => predicate(error),
            None => self.default_should_retry(error),
        }
    }

    fn emit(&self, event: RetryEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = sender.send(event);
        }
    }

    /// Sleep for `delay`, racing the cancellation token when one is set.
    async fn wait(&self, delay: Duration) -> Result<()> {
        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(SeminarError::Cancelled),
                    _ = sleep(delay) => Ok(()),
                }
            }
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }
}

fn ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Retry Driver
// ============================================================================

/// Run `operation`, retrying classified-retryable failures per `policy`.
///
/// Returns the operation's value on first or eventual success. Non-retryable
/// errors propagate immediately after a single attempt; retryable errors
/// propagate once the attempt budget is exhausted. A 429 with a `Retry-After`
/// hint raises the wait to at least the hint.
///
/// # Errors
///
/// The last observed operation error, [`SeminarError::Cancelled`] when a
/// backoff wait is cancelled, or [`SeminarError::InvalidConfig`] when the
/// policy allows zero attempts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if policy.max_retries == 0 {
        return Err(SeminarError::InvalidConfig {
            field: "max_retries".to_string(),
            reason: "policy allows zero attempts".to_string(),
        });
    }

    let mut last_error = None;

    for attempt in 0..policy.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                // Hint only exists when the response carried Retry-After;
                // the reported default is not used for the actual wait.
                let hint = error.retry_after();
                if error.is_rate_limited() {
                    policy.emit(RetryEvent::RateLimited {
                        attempt: attempt + 1,
                        retry_after: hint
                            .unwrap_or(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)),
                    });
                }

                if !policy.should_retry(&error) {
                    return Err(error);
                }

                if attempt + 1 >= policy.max_retries {
                    last_error = Some(error);
                    break;
                }

                let mut delay = policy.delay_for_attempt(attempt);
                if let Some(hint) = hint {
                    delay = delay.max(hint);
                }

                debug!(
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "service call failed, retrying: {error}"
                );
                policy.emit(RetryEvent::Attempt {
                    attempt: attempt + 1,
                    delay,
                    error: error.to_string(),
                });

                policy.wait(delay).await?;
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SeminarError::workflow("retry attempts exhausted")))
}
