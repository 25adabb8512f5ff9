//! Seminar - Resilient Auto-Discussion Engine
//!
//! A client for AI study services that turns a single question into a
//! multi-round discussion: search the web for sources, extract and
//! summarize their content, and ask the study model for a grounded
//! reply, with retries, pacing, and graceful pause and resume throughout.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`retry`] - Generic retry wrapper with exponential backoff and jitter
//! - [`workflow`] - The four-step discussion sequencer and its state machine
//! - [`client`] - The study service trait, HTTP client, and test mock
//! - [`session`] - Discussion transcripts with atomic persistence
//! - [`status`] - Background service availability monitoring
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use seminar::client::MockStudyService;
//! use seminar::workflow::{RunState, Sequencer, SequencerConfig};
//!
//! let service = Arc::new(MockStudyService::new());
//! let mut sequencer = Sequencer::new(service, SequencerConfig::new());
//! let mut events = sequencer.subscribe();
//!
//! sequencer.start("spaced repetition").await?;
//! assert_eq!(sequencer.run().await?, RunState::Complete);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod session;
pub mod status;
pub mod workflow;

// Re-export commonly used types
pub use error::{IntoSeminarError, Result, SeminarError};

// Re-export retry types
pub use retry::{with_retry, RetryEvent, RetryPolicy};

// Re-export service client types
pub use client::{
    create_service, ActionResponse, HttpStudyService, MockStudyService, ServiceConfig,
    ServiceHealth, StudyService,
};

// Re-export workflow types
pub use workflow::{
    RunState, Sequencer, SequencerConfig, Step, StepKind, StepPayload, StepStatus, WorkflowEvent,
    WorkflowState,
};

// Re-export session types
pub use session::persistence::SessionPersistence;
pub use session::{Message, MessageRole, Session, SessionStore};

// Re-export status types
pub use status::{ServerStatus, StatusMonitor};

// Re-export configuration types
pub use config::SeminarConfig;
