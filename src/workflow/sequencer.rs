//! The discussion sequencer.
//!
//! Drives the four-step pipeline against a [`StudyService`], one step at a
//! time: Search finds source URLs, Extract fetches their text, Summarize
//! condenses them, Respond asks the study model for a reply. Completed
//! payloads feed the next step; finished rounds roll the steps over for the
//! next one, with the search window advanced so later rounds see fresh
//! sources.
//!
//! # Architecture
//!
//! - [`SequencerConfig`] - round count, page size, pacing, retry policies
//! - [`Sequencer`] - owns the [`WorkflowState`] and the cancellation token
//!
//! Every service call goes through [`crate::retry::with_retry`]; content
//! fetches use the more patient content-fetch policy. Retry waits surface to
//! observers as [`WorkflowEvent`]s with the step kind attached.
//!
//! Cancellation is treated as a pause: an interrupted step returns to
//! pending, never failed, and a later [`Sequencer::resume`] re-runs it from
//! scratch. A step that fails for real pauses the run and leaves the step
//! marked failed until [`Sequencer::retry_step`] resets it.
//!
//! # Example
//!
//! ```rust,ignore
//! use seminar::client::MockStudyService;
//! use seminar::workflow::{Sequencer, SequencerConfig};
//!
//! let service = Arc::new(MockStudyService::new());
//! let mut sequencer = Sequencer::new(service, SequencerConfig::new());
//! let mut events = sequencer.subscribe();
//!
//! sequencer.start("spaced repetition").await?;
//! let outcome = sequencer.run().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::StudyService;
use crate::error::{Result, SeminarError};
use crate::retry::{with_retry, RetryEvent, RetryPolicy};
use crate::workflow::events::{EventReceiver, EventSender, WorkflowEvent};
use crate::workflow::state::{Advance, RunState, WorkflowState};
use crate::workflow::step::{Document, StepKind, StepPayload, StepStatus};

// ============================================================================
// Constants
// ============================================================================

/// Default number of discussion rounds.
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Fewest rounds a run may perform.
pub const MIN_ITERATIONS: u32 = 1;

/// Most rounds a run may perform.
pub const MAX_ITERATIONS: u32 = 5;

/// Default number of search results requested per round.
pub const DEFAULT_RESULTS_PER_PAGE: u32 = 5;

/// Shortest pacing delay before a service call, in milliseconds.
pub const PACING_MIN_MS: u64 = 1000;

/// Longest pacing delay before a service call, in milliseconds.
pub const PACING_MAX_MS: u64 = 1500;

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for a discussion run.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Rounds to perform, always within `1..=5`.
    pub iterations: u32,
    /// Search results requested per round.
    pub results_per_page: u32,
    /// Whether to sleep briefly before each service call.
    pub pacing: bool,
    /// Retry policy for search, summarize, and respond calls.
    pub retry: RetryPolicy,
    /// More patient retry policy for content fetches.
    pub content_fetch: RetryPolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            pacing: true,
            retry: RetryPolicy::new(),
            content_fetch: RetryPolicy::content_fetch(),
        }
    }
}

impl SequencerConfig {
    /// Create a config with the default round count and policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the round count, clamped to `1..=5`.
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
        self
    }

    /// Set the search page size. Zero is bumped to one.
    #[must_use]
    pub fn with_results_per_page(mut self, results_per_page: u32) -> Self {
        self.results_per_page = results_per_page.max(1);
        self
    }

    /// Enable or disable the pacing delays.
    #[must_use]
    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replace the retry policy used for most service calls.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Replace the retry policy used for content fetches.
    #[must_use]
    pub fn with_content_fetch_policy(mut self, policy: RetryPolicy) -> Self {
        self.content_fetch = policy;
        self
    }
}

// ============================================================================
// Sequencer
// ============================================================================

/// Drives one discussion at a time through the four-step pipeline.
///
/// All methods take `&self`; state lives behind an async mutex so the run
/// loop, a Ctrl-C handler, and status queries can share one `Arc<Sequencer>`.
/// Only [`Sequencer::subscribe`] needs exclusive access, so call it before
/// sharing.
pub struct Sequencer {
    service: Arc<dyn StudyService>,
    config: SequencerConfig,
    state: Mutex<WorkflowState>,
    cancel: Mutex<CancellationToken>,
    events: Option<EventSender>,
}

impl Sequencer {
    /// Create a sequencer over `service`.
    #[must_use]
    pub fn new(service: Arc<dyn StudyService>, config: SequencerConfig) -> Self {
        Self {
            service,
            config,
            state: Mutex::new(WorkflowState::idle()),
            cancel: Mutex::new(CancellationToken::new()),
            events: None,
        }
    }

    /// Open the event channel and return its receiving half.
    ///
    /// Subscribing again replaces the previous receiver.
    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Snapshot of the current workflow state.
    pub async fn state(&self) -> WorkflowState {
        self.state.lock().await.clone()
    }

    /// Fraction of the run finished, in `[0.0, 1.0]`.
    pub async fn progress(&self) -> f64 {
        self.state.lock().await.progress()
    }

    /// Begin a discussion on `subject`.
    ///
    /// Fails if the subject is blank or another discussion is in progress.
    /// The first round's steps are created pending; call [`Sequencer::run`]
    /// to execute them.
    pub async fn start(&self, subject: impl Into<String>) -> Result<()> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(SeminarError::workflow("discussion subject must not be empty"));
        }

        {
            let mut state = self.state.lock().await;
            if state.run_state != RunState::Idle {
                return Err(SeminarError::workflow(format!(
                    "a discussion is already in progress ({}), reset it first",
                    state.run_state
                )));
            }
            *state = WorkflowState::new(subject.clone(), self.config.iterations);
        }
        self.refresh_token().await;

        info!(subject = %subject, iterations = self.config.iterations, "discussion started");
        self.emit(WorkflowEvent::IterationStarted {
            iteration: 1,
            total: self.config.iterations,
        });
        Ok(())
    }

    /// Execute steps until the run completes, pauses, or a step fails.
    ///
    /// Returns the run state reached on a clean stop: `Complete` after the
    /// final round, `Paused` after a pause or cancellation. A failed step
    /// returns its error; the run is left paused with the step marked failed
    /// so [`Sequencer::retry_step`] can pick it up.
    pub async fn run(&self) -> Result<RunState> {
        loop {
            let (index, kind, iteration) = {
                let state = self.state.lock().await;
                match state.run_state {
                    RunState::Idle => {
                        return Err(SeminarError::workflow(
                            "no discussion in progress, start one first",
                        ))
                    }
                    RunState::Paused => return Ok(RunState::Paused),
                    RunState::Complete => return Ok(RunState::Complete),
                    RunState::Running => {}
                }
                let index = state.current_step;
                let step = state.current().ok_or(SeminarError::StepIndex {
                    index,
                    count: state.steps.len(),
                })?;
                if step.status != StepStatus::Pending {
                    return Err(SeminarError::workflow(format!(
                        "step {index} ({}) is {}, retry it before resuming",
                        step.kind, step.status
                    )));
                }
                (index, step.kind, state.iteration)
            };

            self.begin_step(index, kind, iteration).await;

            match self.execute_step(kind).await {
                Ok(payload) => {
                    if let Some(outcome) = self.complete_step(index, kind, iteration, payload).await
                    {
                        return Ok(outcome);
                    }
                }
                Err(error) if error.is_cancelled() => {
                    return Ok(self.interrupt_step(index).await);
                }
                Err(error) => {
                    self.fail_step(index, kind, iteration, &error).await;
                    return Err(error);
                }
            }
        }
    }

    /// Pause the run.
    ///
    /// Interrupts any retry or pacing wait immediately and returns the
    /// interrupted step to pending. An in-flight service call finishes
    /// first; a step that succeeds on the way out stays complete. Safe to
    /// call in any state.
    pub async fn pause(&self) {
        self.cancel.lock().await.cancel();
        let newly_paused = {
            let mut state = self.state.lock().await;
            if state.run_state == RunState::Running {
                state.run_state = RunState::Paused;
                true
            } else {
                false
            }
        };
        if newly_paused {
            info!("discussion paused");
            self.emit(WorkflowEvent::Paused);
        }
    }

    /// Resume a paused run.
    ///
    /// Completed steps keep their payloads; execution continues at the
    /// current step. Call [`Sequencer::run`] afterwards to drive it.
    pub async fn resume(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.run_state != RunState::Paused {
                return Err(SeminarError::workflow(format!(
                    "cannot resume a {} discussion",
                    state.run_state
                )));
            }
            state.run_state = RunState::Running;
        }
        self.refresh_token().await;

        info!("discussion resumed");
        self.emit(WorkflowEvent::Resumed);
        Ok(())
    }

    /// Reset a failed step to pending and aim the cursor at it.
    ///
    /// Only failed steps can be retried; other steps keep their statuses and
    /// payloads. Call [`Sequencer::run`] afterwards to re-execute from that
    /// step.
    pub async fn retry_step(&self, index: usize) -> Result<()> {
        let kind = {
            let mut state = self.state.lock().await;
            if state.run_state == RunState::Idle {
                return Err(SeminarError::workflow("no discussion in progress"));
            }
            state.prepare_retry(index)?;
            state.run_state = RunState::Running;
            state.steps[index].kind
        };
        self.refresh_token().await;

        info!(step = %kind, "retrying failed step");
        Ok(())
    }

    /// Discard the current discussion and return to idle.
    pub async fn reset(&self) {
        self.cancel.lock().await.cancel();
        let mut state = self.state.lock().await;
        *state = WorkflowState::idle();
        info!("discussion reset");
    }

    // ------------------------------------------------------------------
    // Step execution
    // ------------------------------------------------------------------

    async fn execute_step(&self, kind: StepKind) -> Result<StepPayload> {
        match kind {
            StepKind::Search => self.run_search().await,
            StepKind::Extract => self.run_extract().await,
            StepKind::Summarize => self.run_summarize().await,
            StepKind::Respond => self.run_respond().await,
        }
    }

    async fn run_search(&self) -> Result<StepPayload> {
        let (subject, start) = {
            let state = self.state.lock().await;
            (state.subject.clone(), state.search_window_start())
        };
        // Year-qualified queries keep repeat rounds anchored to current
        // material.
        let query = format!("{subject} {}", Utc::now().year());
        let num_results = self.config.results_per_page;

        self.pace().await?;
        let policy = self.policy_for(StepKind::Search).await;
        let service = Arc::clone(&self.service);
        let urls = with_retry(&policy, || {
            let service = Arc::clone(&service);
            let query = query.clone();
            async move { service.search(&query, start, num_results).await }
        })
        .await?;

        if urls.is_empty() {
            return Err(SeminarError::permanent("search returned no sources"));
        }
        debug!(count = urls.len(), start, "sources found");
        Ok(StepPayload::Urls(urls))
    }

    async fn run_extract(&self) -> Result<StepPayload> {
        let urls = match self.payload_of(StepKind::Search).await {
            Some(StepPayload::Urls(urls)) => urls,
            _ => return Err(SeminarError::workflow("no search results to extract from")),
        };

        let mut documents = Vec::with_capacity(urls.len());
        for url in urls {
            self.pace().await?;
            let policy = self.policy_for(StepKind::Extract).await;
            let service = Arc::clone(&self.service);
            let target = url.clone();
            let fetched = with_retry(&policy, || {
                let service = Arc::clone(&service);
                let url = target.clone();
                async move { service.extract_content(&url).await }
            })
            .await;

            match fetched {
                Ok(text) => documents.push(Document { url, text }),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    // A single dead source does not fail the step.
                    warn!(url = %url, error = %error, "skipping source");
                }
            }
        }

        if documents.is_empty() {
            return Err(SeminarError::permanent(
                "could not extract content from any source",
            ));
        }
        Ok(StepPayload::Documents(documents))
    }

    async fn run_summarize(&self) -> Result<StepPayload> {
        let documents = match self.payload_of(StepKind::Extract).await {
            Some(StepPayload::Documents(documents)) => documents,
            _ => return Err(SeminarError::workflow("no extracted content to summarize")),
        };

        let mut summaries = Vec::with_capacity(documents.len());
        for (position, document) in documents.iter().enumerate() {
            self.pace().await?;
            let policy = self.policy_for(StepKind::Summarize).await;
            let service = Arc::clone(&self.service);
            let text = document.text.clone();
            let outcome = with_retry(&policy, || {
                let service = Arc::clone(&service);
                let text = text.clone();
                async move { service.summarize(&text).await }
            })
            .await;

            match outcome {
                Ok(summary) => summaries.push(format!(
                    "Source {} ({}):\n{}",
                    position + 1,
                    document.url,
                    summary
                )),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    warn!(url = %document.url, error = %error, "skipping summary");
                }
            }
        }

        if summaries.is_empty() {
            return Err(SeminarError::permanent("no source could be summarized"));
        }
        Ok(StepPayload::Summary(summaries.join("\n\n")))
    }

    async fn run_respond(&self) -> Result<StepPayload> {
        let summary = match self.payload_of(StepKind::Summarize).await {
            Some(StepPayload::Summary(summary)) => summary,
            _ => return Err(SeminarError::workflow("no summary to respond to")),
        };
        let subject = self.state.lock().await.subject.clone();
        let prompt = format!("Question: {subject}\n\nSummary of sources:\n{summary}");

        self.pace().await?;
        let policy = self.policy_for(StepKind::Respond).await;
        let service = Arc::clone(&self.service);
        let reply = with_retry(&policy, || {
            let service = Arc::clone(&service);
            let prompt = prompt.clone();
            async move { service.respond(&prompt).await }
        })
        .await?;

        Ok(StepPayload::Reply(reply))
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    async fn begin_step(&self, index: usize, kind: StepKind, iteration: u32) {
        {
            let mut state = self.state.lock().await;
            if let Some(step) = state.steps.get_mut(index) {
                step.begin();
            }
        }
        debug!(step = %kind, iteration, "step started");
        self.emit(WorkflowEvent::StepStarted {
            index,
            kind,
            iteration,
        });
    }

    /// Record a completed step and move the cursor. Returns the final run
    /// state when the whole run just finished.
    async fn complete_step(
        &self,
        index: usize,
        kind: StepKind,
        iteration: u32,
        payload: StepPayload,
    ) -> Option<RunState> {
        let (advance, total) = {
            let mut state = self.state.lock().await;
            match state.steps.get_mut(index) {
                Some(step) => step.complete(payload.clone()),
                None => return Some(state.run_state),
            }
            (state.advance(), state.total_iterations)
        };

        debug!(step = %kind, iteration, "step complete");
        self.emit(WorkflowEvent::StepCompleted {
            index,
            kind,
            iteration,
            payload,
        });

        match advance {
            Advance::Step => None,
            Advance::Iteration => {
                info!(iteration, total, "round complete");
                self.emit(WorkflowEvent::IterationCompleted { iteration, total });
                self.emit(WorkflowEvent::IterationStarted {
                    iteration: iteration + 1,
                    total,
                });
                None
            }
            Advance::Complete => {
                info!(iterations = total, "discussion complete");
                self.emit(WorkflowEvent::IterationCompleted { iteration, total });
                self.emit(WorkflowEvent::Completed { iterations: total });
                Some(RunState::Complete)
            }
        }
    }

    /// Return an interrupted step to pending and settle on a paused state.
    async fn interrupt_step(&self, index: usize) -> RunState {
        let (outcome, newly_paused) = {
            let mut state = self.state.lock().await;
            if let Some(step) = state.steps.get_mut(index) {
                if step.status == StepStatus::Running {
                    step.reset();
                }
            }
            let newly_paused = state.run_state == RunState::Running;
            if newly_paused {
                state.run_state = RunState::Paused;
            }
            (state.run_state, newly_paused)
        };
        debug!("step interrupted, run paused");
        if newly_paused {
            self.emit(WorkflowEvent::Paused);
        }
        outcome
    }

    async fn fail_step(&self, index: usize, kind: StepKind, iteration: u32, error: &SeminarError) {
        let message = error.to_string();
        {
            let mut state = self.state.lock().await;
            if let Some(step) = state.steps.get_mut(index) {
                step.fail(message.clone());
            }
            if state.run_state == RunState::Running {
                state.run_state = RunState::Paused;
            }
        }
        warn!(step = %kind, error = %message, "step failed");
        self.emit(WorkflowEvent::StepFailed {
            index,
            kind,
            iteration,
            error: message,
        });
    }

    /// Payload produced by the named step in the current round, if any.
    async fn payload_of(&self, kind: StepKind) -> Option<StepPayload> {
        let state = self.state.lock().await;
        state
            .steps
            .iter()
            .find(|step| step.kind == kind)
            .and_then(|step| step.payload.clone())
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver means nobody is watching; keep going.
            let _ = events.send(event);
        }
    }

    async fn token(&self) -> CancellationToken {
        self.cancel.lock().await.clone()
    }

    /// Install a fresh cancellation token. A `CancellationToken` stays
    /// cancelled forever, so resuming needs a new one.
    async fn refresh_token(&self) {
        let mut guard = self.cancel.lock().await;
        *guard = CancellationToken::new();
    }

    /// Retry policy for one service call of the given step, wired to the
    /// current token and the event channel.
    async fn policy_for(&self, kind: StepKind) -> RetryPolicy {
        let base = if kind == StepKind::Extract {
            self.config.content_fetch.clone()
        } else {
            self.config.retry.clone()
        };
        let mut policy = base.with_cancellation(self.token().await);
        if let Some(events) = &self.events {
            policy = policy.with_events(bridge_retry_events(kind, events.clone()));
        }
        policy
    }

    /// Brief randomized delay before a service call, so bursts of requests
    /// do not hammer the service. Interruptible by cancellation.
    async fn pace(&self) -> Result<()> {
        if !self.config.pacing {
            return Ok(());
        }
        let delay =
            Duration::from_millis(rand::thread_rng().gen_range(PACING_MIN_MS..=PACING_MAX_MS));
        debug!(?delay, "pacing before service call");
        let token = self.token().await;
        tokio::select! {
            _ = token.cancelled() => Err(SeminarError::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }
}

/// Forward retry-layer events to workflow observers with the step attached.
///
/// The forwarding task lives as long as the returned sender does, which is
/// the lifetime of one step's retry policy.
fn bridge_retry_events(kind: StepKind, events: EventSender) -> mpsc::UnboundedSender<RetryEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let mapped = match event {
                RetryEvent::Attempt {
                    attempt,
                    delay,
                    error,
                } => WorkflowEvent::RetryScheduled {
                    kind,
                    attempt,
                    delay,
                    error,
                },
                RetryEvent::RateLimited {
                    attempt,
                    retry_after,
                } => WorkflowEvent::RateLimited {
                    kind,
                    attempt,
                    retry_after,
                },
            };
            if events.send(mapped).is_err() {
                break;
            }
        }
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockStudyService;

    fn fast_config() -> SequencerConfig {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(10))
            .with_jitter_bound(Duration::ZERO);
        SequencerConfig::new()
            .with_iterations(1)
            .with_pacing(false)
            .with_retry_policy(policy.clone())
            .with_content_fetch_policy(policy)
    }

    /// Test configuration defaults.
    #[test]
    fn test_sequencer_config_defaults() {
        let config = SequencerConfig::new();
        assert_eq!(config.iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.results_per_page, DEFAULT_RESULTS_PER_PAGE);
        assert!(config.pacing);
    }

    /// Test the iteration clamp on both ends.
    #[test]
    fn test_sequencer_config_clamps_iterations() {
        assert_eq!(SequencerConfig::new().with_iterations(0).iterations, 1);
        assert_eq!(SequencerConfig::new().with_iterations(4).iterations, 4);
        assert_eq!(SequencerConfig::new().with_iterations(9).iterations, 5);
        assert_eq!(
            SequencerConfig::new().with_results_per_page(0).results_per_page,
            1
        );
    }

    /// Test that a blank subject is rejected.
    #[tokio::test]
    async fn test_start_requires_subject() {
        let sequencer = Sequencer::new(Arc::new(MockStudyService::new()), fast_config());
        assert!(sequencer.start("   ").await.is_err());
    }

    /// Test that a second start without a reset is rejected.
    #[tokio::test]
    async fn test_start_twice_fails() {
        let sequencer = Sequencer::new(Arc::new(MockStudyService::new()), fast_config());
        sequencer.start("first topic").await.unwrap();
        let error = sequencer.start("second topic").await.unwrap_err();
        assert!(error.to_string().contains("already in progress"));
    }

    /// Test that running without a started discussion fails.
    #[tokio::test]
    async fn test_run_without_start_fails() {
        let sequencer = Sequencer::new(Arc::new(MockStudyService::new()), fast_config());
        let error = sequencer.run().await.unwrap_err();
        assert!(error.to_string().contains("no discussion in progress"));
    }

    /// Test a full single-round run against the mock.
    #[tokio::test]
    async fn test_run_completes_single_round() {
        let mock = Arc::new(MockStudyService::new());
        let sequencer = Sequencer::new(mock.clone(), fast_config());

        sequencer.start("spaced repetition").await.unwrap();
        let outcome = sequencer.run().await.unwrap();
        assert_eq!(outcome, RunState::Complete);

        let state = sequencer.state().await;
        assert_eq!(state.run_state, RunState::Complete);
        assert!(state.steps.iter().all(|step| step.is_complete()));
        assert_eq!(state.progress(), 1.0);

        // Two mock URLs: one search, two fetches, two summaries, one reply.
        assert_eq!(mock.search_calls(), 1);
        assert_eq!(mock.extract_calls(), 2);
        assert_eq!(mock.summarize_calls(), 2);
        assert_eq!(mock.respond_calls(), 1);
        assert_eq!(mock.last_search_start(), 1);
    }

    /// Test that reset returns to idle and allows a fresh start.
    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let sequencer = Sequencer::new(Arc::new(MockStudyService::new()), fast_config());
        sequencer.start("first topic").await.unwrap();
        sequencer.reset().await;

        assert_eq!(sequencer.state().await.run_state, RunState::Idle);
        sequencer.start("second topic").await.unwrap();
        assert_eq!(sequencer.run().await.unwrap(), RunState::Complete);
    }

    /// Test that pause outside a running discussion changes nothing.
    #[tokio::test]
    async fn test_pause_is_noop_when_idle() {
        let sequencer = Sequencer::new(Arc::new(MockStudyService::new()), fast_config());
        sequencer.pause().await;
        assert_eq!(sequencer.state().await.run_state, RunState::Idle);
    }

    /// Test that resume outside a paused discussion is rejected.
    #[tokio::test]
    async fn test_resume_requires_paused() {
        let sequencer = Sequencer::new(Arc::new(MockStudyService::new()), fast_config());
        assert!(sequencer.resume().await.is_err());

        sequencer.start("topic").await.unwrap();
        let error = sequencer.resume().await.unwrap_err();
        assert!(error.to_string().contains("cannot resume"));
    }

    /// Test that an empty search result fails the search step.
    #[tokio::test]
    async fn test_empty_search_fails_step() {
        let mock = Arc::new(MockStudyService::new().with_urls(Vec::<String>::new()));
        let sequencer = Sequencer::new(mock, fast_config());

        sequencer.start("obscure topic").await.unwrap();
        let error = sequencer.run().await.unwrap_err();
        assert!(error.to_string().contains("no sources"));

        let state = sequencer.state().await;
        assert_eq!(state.run_state, RunState::Paused);
        assert!(state.steps[0].is_failed());
    }
}
