use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::state::{JobState, TerminalOutcome};
use crate::service::{ConversionService, ServiceError};

/// What one progress query means for the session.
enum Tick {
    /// In-flight value in 0..100; keep polling
    Advance(u8),
    /// The job is done; record the outcome and stop
    Terminal(TerminalOutcome),
}

/// The live recurring timer that tracks one job's progress until a
/// terminal outcome.
///
/// At most one session may be active per job state; whoever spawns a new
/// one is responsible for stopping its predecessor first. Dropping the
/// session stops it.
pub struct PollingSession {
    job_id: String,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollingSession {
    /// Spawn the polling task for `job_id`, querying `service` once per
    /// `interval`. The first query fires one full interval after spawn.
    ///
    /// The task holds only a weak reference to the job state, so when the
    /// owning controller goes away the task exits on its next tick even
    /// if nobody called [`stop`](Self::stop).
    pub fn spawn(
        service: Arc<dyn ConversionService>,
        state: Weak<Mutex<JobState>>,
        job_id: String,
        interval: Duration,
    ) -> Self {
        debug!("Starting polling session for job {} every {:?}", job_id, interval);

        let stopped = Arc::new(AtomicBool::new(false));

        let task_stopped = Arc::clone(&stopped);
        let task_job_id = job_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);

            loop {
                ticker.tick().await;
                if task_stopped.load(Ordering::SeqCst) {
                    break;
                }
                if state.strong_count() == 0 {
                    debug!("Job state gone; polling task for {} exiting", task_job_id);
                    break;
                }

                let tick = classify(service.progress(&task_job_id).await, &task_job_id);

                let Some(state) = state.upgrade() else {
                    debug!("Job state gone; polling task for {} exiting", task_job_id);
                    break;
                };
                let mut state = state.lock().await;

                // A resubmission may have stopped this session while the
                // query was in flight.
                if task_stopped.load(Ordering::SeqCst) {
                    break;
                }

                match tick {
                    Tick::Advance(percent) => {
                        if !state.record_progress(&task_job_id, percent) {
                            break;
                        }
                    }
                    Tick::Terminal(outcome) => {
                        // Stop before reporting, so no further tick can
                        // run even if the report is discarded as stale.
                        task_stopped.store(true, Ordering::SeqCst);
                        state.finish(&task_job_id, outcome);
                        break;
                    }
                }
            }
        });

        Self {
            job_id,
            stopped,
            handle: Some(handle),
        }
    }

    /// Job this session belongs to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// True once the session has been stopped or finished on its own.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the session. Idempotent; safe to call after the session has
    /// already finished or been stopped.
    pub fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Stopping polling session for job {}", self.job_id);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Interpret one progress query result.
///
/// Valid values are 0..=100 plus the -1 failure sentinel; anything else
/// (including a query error) ends the session as a communication failure.
fn classify(result: Result<i64, ServiceError>, job_id: &str) -> Tick {
    match result {
        Ok(-1) => {
            warn!("Service reported failed generation for job {}", job_id);
            Tick::Terminal(TerminalOutcome::ServiceFailure)
        }
        Ok(value @ 0..=99) => Tick::Advance(value as u8),
        Ok(100) => Tick::Terminal(TerminalOutcome::Completed),
        Ok(value) => {
            warn!("Job {} reported out-of-range progress {}", job_id, value);
            Tick::Terminal(TerminalOutcome::QueryFailure)
        }
        Err(e) => {
            warn!("Progress query for job {} failed: {}", job_id, e);
            Tick::Terminal(TerminalOutcome::QueryFailure)
        }
    }
}
