pub mod config;
pub mod job;
pub mod service;

pub use config::Config;
pub use job::{
    FailureKind, Job, JobController, JobPhase, JobSnapshot, JobState, PollingSession, SubmitError,
    TerminalOutcome,
};
pub use service::{
    ConversionService, Document, HttpConversionService, JobTicket, ProgressMessage, ServiceError,
    Voice,
};
