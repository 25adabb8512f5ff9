//! Progress events emitted by the sequencer.
//!
//! Observers subscribe through [`crate::workflow::Sequencer::subscribe`] and
//! receive every state change on an unbounded channel: step lifecycle,
//! retry waits bubbled up from the retry layer, round boundaries, and run
//! completion. Sending never blocks the workflow; a dropped receiver simply
//! ends delivery.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::workflow::step::{StepKind, StepPayload};

/// Sending half of a workflow event channel.
pub type EventSender = mpsc::UnboundedSender<WorkflowEvent>;

/// Receiving half of a workflow event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<WorkflowEvent>;

/// A state change in a discussion run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A round began.
    IterationStarted { iteration: u32, total: u32 },
    /// A step began executing.
    StepStarted {
        index: usize,
        kind: StepKind,
        iteration: u32,
    },
    /// A step finished and produced a payload.
    StepCompleted {
        index: usize,
        kind: StepKind,
        iteration: u32,
        payload: StepPayload,
    },
    /// A step failed after exhausting its retries.
    StepFailed {
        index: usize,
        kind: StepKind,
        iteration: u32,
        error: String,
    },
    /// A retry wait was scheduled for a step's service call.
    RetryScheduled {
        kind: StepKind,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// The service rate-limited a step's service call.
    RateLimited {
        kind: StepKind,
        attempt: u32,
        retry_after: Duration,
    },
    /// A round finished with every step complete.
    IterationCompleted { iteration: u32, total: u32 },
    /// The run was paused, by request or by a failed step.
    Paused,
    /// A paused run was resumed.
    Resumed,
    /// The final round finished.
    Completed { iterations: u32 },
}

impl WorkflowEvent {
    /// Short name of the event variant, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::IterationStarted { .. } => "iteration_started",
            WorkflowEvent::StepStarted { .. } => "step_started",
            WorkflowEvent::StepCompleted { .. } => "step_completed",
            WorkflowEvent::StepFailed { .. } => "step_failed",
            WorkflowEvent::RetryScheduled { .. } => "retry_scheduled",
            WorkflowEvent::RateLimited { .. } => "rate_limited",
            WorkflowEvent::IterationCompleted { .. } => "iteration_completed",
            WorkflowEvent::Paused => "paused",
            WorkflowEvent::Resumed => "resumed",
            WorkflowEvent::Completed { .. } => "completed",
        }
    }
}
