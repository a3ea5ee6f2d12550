//! Conversion job lifecycle
//!
//! This module owns the submission + polling state machine:
//! - `JobController` - submission lifecycle and the observable state feed
//! - `PollingSession` - the recurring progress timer for one job
//! - `JobState` - the shared record every transition flows through

mod controller;
mod poller;
mod state;

pub use controller::{JobController, SubmitError};
pub use poller::PollingSession;
pub use state::{FailureKind, Job, JobPhase, JobSnapshot, JobState, TerminalOutcome};
