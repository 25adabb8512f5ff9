//! Discussion run state.
//!
//! [`WorkflowState`] is the single snapshot the sequencer mutates: the four
//! steps, the cursor into them, the round counters, and the overall
//! [`RunState`]. It also owns the bookkeeping rules, advancing the cursor,
//! rolling steps over between rounds, and the progress fraction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SeminarError};
use crate::workflow::step::{Step, StepKind, StepStatus};

/// How far the search window moves between rounds.
///
/// Round one asks for results starting at rank 1, round two at rank 11, and
/// so on, so repeated rounds see fresh sources.
pub const SEARCH_WINDOW_STEP: u32 = 10;

/// Overall state of a discussion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No discussion has been started.
    Idle,
    /// The sequencer is driving steps.
    Running,
    /// Halted by the user or by a failed step; resumable.
    Paused,
    /// Every round finished.
    Complete,
}

impl RunState {
    /// Whether the sequencer should be driving steps right now.
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Complete => "complete",
        };
        write!(f, "{name}")
    }
}

/// What [`WorkflowState::advance`] did with the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next step in the same round.
    Step,
    /// Finished a round and reset the steps for the next one.
    Iteration,
    /// Finished the final round; the run is complete.
    Complete,
}

/// Snapshot of one discussion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The pipeline steps for the current round.
    pub steps: Vec<Step>,
    /// Index of the step the sequencer works on next.
    pub current_step: usize,
    /// What the discussion is about.
    pub subject: String,
    /// Current round, 1-based.
    pub iteration: u32,
    /// How many rounds the run will perform.
    pub total_iterations: u32,
    /// Overall run state.
    pub run_state: RunState,
}

impl WorkflowState {
    /// The empty state before any discussion starts.
    pub fn idle() -> Self {
        Self {
            steps: Vec::new(),
            current_step: 0,
            subject: String::new(),
            iteration: 0,
            total_iterations: 0,
            run_state: RunState::Idle,
        }
    }

    /// Create the state for a fresh run on `subject`.
    pub fn new(subject: impl Into<String>, total_iterations: u32) -> Self {
        Self {
            steps: StepKind::ALL.iter().map(|kind| Step::new(*kind)).collect(),
            current_step: 0,
            subject: subject.into(),
            iteration: 1,
            total_iterations,
            run_state: RunState::Running,
        }
    }

    /// The step the cursor points at, if the run has steps.
    pub fn current(&self) -> Option<&Step> {
        self.steps.get(self.current_step)
    }

    /// 1-based rank of the first search result wanted this round.
    pub fn search_window_start(&self) -> u32 {
        self.iteration.saturating_sub(1) * SEARCH_WINDOW_STEP + 1
    }

    /// First failed step, if any.
    pub fn first_failed(&self) -> Option<(usize, &Step)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.is_failed())
    }

    /// Steps finished across the whole run, earlier rounds included.
    pub fn completed_steps(&self) -> u32 {
        let in_round = self.steps.iter().filter(|step| step.is_complete()).count() as u32;
        let prior_rounds = self.iteration.saturating_sub(1) * self.steps.len() as u32;
        prior_rounds + in_round
    }

    /// Total steps the run will perform across all rounds.
    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32 * self.total_iterations
    }

    /// Fraction of the run finished, in `[0.0, 1.0]`. Zero when idle.
    pub fn progress(&self) -> f64 {
        let total = self.total_steps();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.completed_steps()) / f64::from(total)
    }

    /// Move the cursor past a just-completed step.
    ///
    /// Within a round the cursor advances one step. At the end of a round
    /// the steps reset to pending for the next one; at the end of the final
    /// round the run is marked complete.
    pub fn advance(&mut self) -> Advance {
        if self.current_step + 1 < self.steps.len() {
            self.current_step += 1;
            return Advance::Step;
        }
        if self.iteration < self.total_iterations {
            self.iteration += 1;
            for step in &mut self.steps {
                step.reset();
            }
            self.current_step = 0;
            return Advance::Iteration;
        }
        self.run_state = RunState::Complete;
        Advance::Complete
    }

    /// Prepare a failed step for another attempt.
    ///
    /// Resets that step (and only that step) to pending and moves the
    /// cursor to it. Other steps keep their statuses and payloads.
    pub fn prepare_retry(&mut self, index: usize) -> Result<()> {
        let count = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(SeminarError::StepIndex { index, count })?;
        if step.status != StepStatus::Failed {
            return Err(SeminarError::workflow(format!(
                "step {index} ({}) is {}, only failed steps can be retried",
                step.kind, step.status
            )));
        }
        step.reset();
        self.current_step = index;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::step::StepPayload;

    fn complete_current(state: &mut WorkflowState) -> Advance {
        let index = state.current_step;
        state.steps[index].begin();
        state.steps[index].complete(StepPayload::Summary("done".to_string()));
        state.advance()
    }

    /// Test the shape of a freshly started run.
    #[test]
    fn test_new_state_shape() {
        let state = WorkflowState::new("metacognition", 3);
        assert_eq!(state.steps.len(), 4);
        assert_eq!(state.current_step, 0);
        assert_eq!(state.iteration, 1);
        assert_eq!(state.total_iterations, 3);
        assert_eq!(state.run_state, RunState::Running);
        assert!(state
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Pending));
    }

    /// Test that the idle state reports zero progress.
    #[test]
    fn test_idle_state() {
        let state = WorkflowState::idle();
        assert_eq!(state.run_state, RunState::Idle);
        assert!(state.current().is_none());
        assert_eq!(state.progress(), 0.0);
    }

    /// Test cursor movement within a round.
    #[test]
    fn test_advance_within_round() {
        let mut state = WorkflowState::new("subject", 1);
        assert_eq!(complete_current(&mut state), Advance::Step);
        assert_eq!(state.current_step, 1);
        assert_eq!(state.iteration, 1);
    }

    /// Test the rollover between rounds: steps reset, cursor back to zero.
    #[test]
    fn test_advance_rolls_over_between_rounds() {
        let mut state = WorkflowState::new("subject", 2);
        for _ in 0..3 {
            assert_eq!(complete_current(&mut state), Advance::Step);
        }
        assert_eq!(complete_current(&mut state), Advance::Iteration);

        assert_eq!(state.iteration, 2);
        assert_eq!(state.current_step, 0);
        assert_eq!(state.run_state, RunState::Running);
        assert!(state
            .steps
            .iter()
            .all(|step| step.status == StepStatus::Pending && step.payload.is_none()));
    }

    /// Test that finishing the final round completes the run.
    #[test]
    fn test_advance_completes_final_round() {
        let mut state = WorkflowState::new("subject", 1);
        for _ in 0..3 {
            complete_current(&mut state);
        }
        assert_eq!(complete_current(&mut state), Advance::Complete);
        assert_eq!(state.run_state, RunState::Complete);
        assert_eq!(state.progress(), 1.0);
    }

    /// Test progress accounting across rounds.
    #[test]
    fn test_progress_counts_prior_rounds() {
        let mut state = WorkflowState::new("subject", 2);
        assert_eq!(state.progress(), 0.0);

        complete_current(&mut state);
        complete_current(&mut state);
        // 2 of 8 total steps.
        assert!((state.progress() - 0.25).abs() < f64::EPSILON);

        complete_current(&mut state);
        complete_current(&mut state);
        // Round rolled over: steps are pending again but the fraction keeps
        // counting the finished round.
        assert_eq!(state.iteration, 2);
        assert!((state.progress() - 0.5).abs() < f64::EPSILON);
    }

    /// Test the search window advancing by ten per round.
    #[test]
    fn test_search_window_start_per_round() {
        let mut state = WorkflowState::new("subject", 3);
        assert_eq!(state.search_window_start(), 1);
        state.iteration = 2;
        assert_eq!(state.search_window_start(), 11);
        state.iteration = 3;
        assert_eq!(state.search_window_start(), 21);
    }

    /// Test retry preparation resets only the chosen step.
    #[test]
    fn test_prepare_retry_resets_only_target() {
        let mut state = WorkflowState::new("subject", 1);
        state.steps[0].begin();
        state.steps[0].complete(StepPayload::Urls(vec!["https://a.test".to_string()]));
        state.steps[1].begin();
        state.steps[1].fail("fetch failed");
        state.current_step = 1;

        state.prepare_retry(1).unwrap();

        assert_eq!(state.current_step, 1);
        assert_eq!(state.steps[1].status, StepStatus::Pending);
        assert!(state.steps[1].error.is_none());
        assert!(state.steps[0].is_complete());
        assert!(state.steps[0].payload.is_some());
    }

    /// Test retry validation for bad indices and non-failed steps.
    #[test]
    fn test_prepare_retry_validation() {
        let mut state = WorkflowState::new("subject", 1);

        let out_of_range = state.prepare_retry(9).unwrap_err();
        assert!(matches!(
            out_of_range,
            SeminarError::StepIndex { index: 9, count: 4 }
        ));

        let not_failed = state.prepare_retry(0).unwrap_err();
        assert!(not_failed.to_string().contains("only failed steps"));
    }

    /// Test the first-failed lookup.
    #[test]
    fn test_first_failed_lookup() {
        let mut state = WorkflowState::new("subject", 1);
        assert!(state.first_failed().is_none());

        state.steps[2].fail("summarizer down");
        let (index, step) = state.first_failed().unwrap();
        assert_eq!(index, 2);
        assert_eq!(step.kind, StepKind::Summarize);
    }
}
