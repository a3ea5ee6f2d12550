use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use super::poller::PollingSession;
use super::state::{Job, JobSnapshot, JobState, TerminalOutcome};
use crate::service::{ConversionService, Document, ServiceError, Voice};

/// Errors returned by [`JobController::submit`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The document payload was empty; nothing was sent to the service
    #[error("no document content to submit")]
    EmptyDocument,

    /// The submission reached the service and failed there
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A newer submission replaced this one while it was in flight
    #[error("submission superseded by a newer one")]
    Superseded,
}

/// Drives the lifecycle of a single conversion attempt: one job at a
/// time, one polling session per job.
///
/// The controller owns the shared [`JobState`]; dropping it stops any
/// session that is still running.
pub struct JobController {
    service: Arc<dyn ConversionService>,
    poll_interval: Duration,
    state: Arc<Mutex<JobState>>,
    snapshot_rx: watch::Receiver<JobSnapshot>,
}

impl JobController {
    /// Delay between progress queries unless configured otherwise.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(service: Arc<dyn ConversionService>, poll_interval: Duration) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(JobSnapshot::idle());
        Self {
            service,
            poll_interval,
            state: Arc::new(Mutex::new(JobState::new(snapshot_tx))),
            snapshot_rx,
        }
    }

    /// Watch every state transition. The receiver starts at the current
    /// snapshot; rendering is a pure projection of what it yields.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshot_rx.clone()
    }

    /// The current state snapshot.
    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Submit a document for conversion.
    ///
    /// Any session belonging to a previous job is stopped before the
    /// request is issued, so a resubmission can never race its
    /// predecessor's timer. On acceptance the returned [`Job`] is already
    /// being polled.
    ///
    /// An empty document is rejected without touching the service or the
    /// published state.
    pub async fn submit(&self, document: Document, voice: Voice) -> Result<Job, SubmitError> {
        if document.is_empty() {
            return Err(SubmitError::EmptyDocument);
        }

        let generation = self.state.lock().await.begin_upload();

        info!(
            "Submitting {} ({} bytes) with voice {}",
            document.file_name,
            document.content.len(),
            voice
        );

        let ticket = match self.service.submit(&document, voice).await {
            Ok(ticket) => ticket,
            Err(e) => {
                error!("Submission of {} failed: {}", document.file_name, e);
                let mut state = self.state.lock().await;
                if state.is_current_attempt(generation) {
                    state.fail_upload();
                }
                return Err(e.into());
            }
        };

        let job = Job {
            id: ticket.job_id,
            audio_url: ticket.audio_url,
            voice,
            submitted_at: Utc::now(),
        };

        let mut state = self.state.lock().await;
        if !state.is_current_attempt(generation) {
            info!(
                "Submission of {} superseded before acceptance; discarding job {}",
                document.file_name, job.id
            );
            return Err(SubmitError::Superseded);
        }

        info!("Job {} accepted, polling every {:?}", job.id, self.poll_interval);

        let session = PollingSession::spawn(
            Arc::clone(&self.service),
            Arc::downgrade(&self.state),
            job.id.clone(),
            self.poll_interval,
        );
        state.begin_polling(job.clone(), session);

        Ok(job)
    }

    /// Record a terminal outcome for `job_id`. Reports for anything other
    /// than the current job are ignored.
    ///
    /// Normally invoked by the polling session through the shared state;
    /// public so an embedding application can inject outcomes it learned
    /// through another channel.
    pub async fn on_terminal(&self, job_id: &str, outcome: TerminalOutcome) {
        self.state.lock().await.finish(job_id, outcome);
    }

    /// Discard the current job and any active session, returning to
    /// `Idle`. A fresh submission can follow but is not required.
    pub async fn reset(&self) {
        self.state.lock().await.clear();
    }
}
