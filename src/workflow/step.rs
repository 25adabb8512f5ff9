//! Step machine for the discussion pipeline.
//!
//! A discussion round runs four steps in a fixed order: Search, Extract,
//! Summarize, Respond. Each step owns its lifecycle status, the payload it
//! produced, and failure details. The sequencer drives transitions; this
//! module only models them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Search the web for source URLs.
    Search,
    /// Fetch readable text for each source.
    Extract,
    /// Condense the fetched sources.
    Summarize,
    /// Compose the model's reply.
    Respond,
}

impl StepKind {
    /// All kinds in pipeline order.
    pub const ALL: [StepKind; 4] = [
        StepKind::Search,
        StepKind::Extract,
        StepKind::Summarize,
        StepKind::Respond,
    ];

    /// Progress-display label for the stage.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Search => "Searching for sources",
            StepKind::Extract => "Extracting content",
            StepKind::Summarize => "Summarizing sources",
            StepKind::Respond => "Composing reply",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Search => "search",
            StepKind::Extract => "extract",
            StepKind::Summarize => "summarize",
            StepKind::Respond => "respond",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started in the current round.
    Pending,
    /// Currently executing.
    Running,
    /// Finished and produced a payload.
    Complete,
    /// Errored; recoverable through an explicit retry.
    Failed,
}

impl StepStatus {
    /// Whether the step has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Complete | StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Complete => "complete",
            StepStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// A fetched source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Where the text came from.
    pub url: String,
    /// Readable page text.
    pub text: String,
}

/// Data produced by a completed step and consumed by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum StepPayload {
    /// Source URLs from the search stage.
    Urls(Vec<String>),
    /// Fetched documents from the extract stage.
    Documents(Vec<Document>),
    /// Combined summary from the summarize stage.
    Summary(String),
    /// Model reply from the respond stage.
    Reply(String),
}

/// One pipeline step with its status and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Which stage this is.
    pub kind: StepKind,
    /// Current lifecycle status.
    pub status: StepStatus,
    /// Output of the last successful run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<StepPayload>,
    /// Failure description when the status is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the step last started running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the step last reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Create a pending step for `kind`.
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            status: StepStatus::Pending,
            payload: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the step running. Clears any stale error from a prior attempt.
    pub fn begin(&mut self) {
        self.status = StepStatus::Running;
        self.error = None;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    /// Mark the step complete with the payload it produced.
    pub fn complete(&mut self, payload: StepPayload) {
        self.status = StepStatus::Complete;
        self.payload = Some(payload);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the step failed with a description of what went wrong.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Return the step to pending, dropping payload, error, and timestamps.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.payload = None;
        self.error = None;
        self.started_at = None;
        self.completed_at = None;
    }

    /// Whether the step completed successfully.
    pub fn is_complete(&self) -> bool {
        self.status == StepStatus::Complete
    }

    /// Whether the step failed.
    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    /// Wall-clock time the last run took, when both timestamps exist.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        (completed - started).to_std().ok()
    }
}
