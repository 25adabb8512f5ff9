//! The auto-discussion workflow.
//!
//! A discussion runs a fixed four-step pipeline, Search then Extract then
//! Summarize then Respond, for a bounded number of rounds. The pieces:
//!
//! - [`step`] - the step machine: kinds, statuses, payloads
//! - [`state`] - the run snapshot: cursor, rounds, progress
//! - [`events`] - progress events for observers
//! - [`sequencer`] - the driver that executes steps against a service
//!
//! The sequencer is the only writer of workflow state. Observers watch
//! through the event channel; controllers pause, resume, retry, and reset
//! through the sequencer's methods.

pub mod events;
pub mod sequencer;
pub mod state;
pub mod step;

pub use events::{EventReceiver, EventSender, WorkflowEvent};
pub use sequencer::{
    Sequencer, SequencerConfig, DEFAULT_ITERATIONS, DEFAULT_RESULTS_PER_PAGE, MAX_ITERATIONS,
    MIN_ITERATIONS, PACING_MAX_MS, PACING_MIN_MS,
};
pub use state::{Advance, RunState, WorkflowState, SEARCH_WINDOW_STEP};
pub use step::{Document, Step, StepKind, StepPayload, StepStatus};
