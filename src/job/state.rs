use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::poller::PollingSession;
use crate::service::Voice;

/// Why a conversion attempt ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The submission itself failed (transport error or malformed response)
    Upload,
    /// The service reported that audio generation failed
    Generation,
    /// A progress query failed or returned an unintelligible value
    Communication,
}

/// Lifecycle phase of the current conversion attempt.
///
/// `Succeeded` and `Failed` are terminal for the attempt but the
/// controller re-enters `Uploading` on the next submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    Uploading,
    Polling,
    Succeeded,
    Failed(FailureKind),
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed(_))
    }
}

/// One accepted conversion job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Server-assigned identifier, unique per submission
    pub id: String,
    /// Artifact location, known at submission acceptance
    pub audio_url: String,
    /// Voice the document is read with
    pub voice: Voice,
    /// When the submission was accepted
    pub submitted_at: DateTime<Utc>,
}

/// Observable state of the controller, published on every transition.
/// Front ends render this; the core never renders anything itself.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    /// Percent complete (0..=100), meaningful while `Polling`
    pub progress: u8,
    pub job: Option<Job>,
}

impl JobSnapshot {
    pub fn idle() -> Self {
        Self {
            phase: JobPhase::Idle,
            progress: 0,
            job: None,
        }
    }
}

/// Terminal outcome reported by a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// Progress reached 100
    Completed,
    /// The service reported generation failure (progress -1)
    ServiceFailure,
    /// The query itself failed or returned an out-of-range value
    QueryFailure,
}

/// Mutable record shared between the controller and the active polling
/// session. All state-machine transitions flow through these methods,
/// and every change is mirrored to the watch channel for observers.
///
/// The active session lives here as an owned field: it is started and
/// stopped only through `begin_upload`/`begin_polling`/`finish`/`clear`,
/// never from ambient code.
pub struct JobState {
    job: Option<Job>,
    session: Option<PollingSession>,
    phase: JobPhase,
    progress: u8,
    generation: u64,
    snapshot_tx: watch::Sender<JobSnapshot>,
}

impl JobState {
    pub fn new(snapshot_tx: watch::Sender<JobSnapshot>) -> Self {
        Self {
            job: None,
            session: None,
            phase: JobPhase::Idle,
            progress: 0,
            generation: 0,
            snapshot_tx,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn has_active_session(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_stopped())
    }

    /// Begin a new submission attempt: discard the previous job and stop
    /// its session before anything is sent to the service. Returns the
    /// generation number identifying the new attempt.
    pub fn begin_upload(&mut self) -> u64 {
        self.stop_session();
        self.job = None;
        self.progress = 0;
        self.phase = JobPhase::Uploading;
        self.generation += 1;
        self.publish();
        self.generation
    }

    /// True while `generation` still identifies the latest attempt.
    pub fn is_current_attempt(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Record a failed submission.
    pub fn fail_upload(&mut self) {
        self.phase = JobPhase::Failed(FailureKind::Upload);
        self.publish();
    }

    /// Install the accepted job and its polling session.
    pub fn begin_polling(&mut self, job: Job, session: PollingSession) {
        if self.has_active_session() {
            warn!("A polling session is already active; stopping it first");
        }
        self.stop_session();
        self.progress = 0;
        self.phase = JobPhase::Polling;
        self.job = Some(job);
        self.session = Some(session);
        self.publish();
    }

    /// Apply a progress update from the session polling `job_id`. Returns
    /// false when the update belongs to a superseded job, in which case
    /// the reporting session should stop itself.
    pub fn record_progress(&mut self, job_id: &str, percent: u8) -> bool {
        if !self.is_current_job(job_id) {
            debug!("Dropping progress update from stale session for job {}", job_id);
            return false;
        }
        self.progress = percent;
        self.publish();
        true
    }

    /// Record a terminal outcome for `job_id` and release its session.
    /// Reports from superseded sessions are ignored.
    pub fn finish(&mut self, job_id: &str, outcome: TerminalOutcome) {
        if !self.is_current_job(job_id) {
            debug!("Ignoring terminal report from stale session for job {}", job_id);
            return;
        }
        self.stop_session();
        self.phase = match outcome {
            TerminalOutcome::Completed => {
                self.progress = 100;
                JobPhase::Succeeded
            }
            TerminalOutcome::ServiceFailure => JobPhase::Failed(FailureKind::Generation),
            TerminalOutcome::QueryFailure => JobPhase::Failed(FailureKind::Communication),
        };
        self.publish();
    }

    /// Discard the current job and return to `Idle`. Also supersedes any
    /// submission still in flight.
    pub fn clear(&mut self) {
        self.stop_session();
        self.job = None;
        self.progress = 0;
        self.phase = JobPhase::Idle;
        self.generation += 1;
        self.publish();
    }

    fn is_current_job(&self, job_id: &str) -> bool {
        matches!(&self.job, Some(job) if job.id == job_id)
    }

    fn stop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(JobSnapshot {
            phase: self.phase,
            progress: self.progress,
            job: self.job.clone(),
        });
    }
}
