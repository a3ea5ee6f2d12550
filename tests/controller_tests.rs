// Integration tests for the job controller state machine.
//
// A scripted in-memory service stands in for the remote conversion
// service, so submissions and progress sequences are deterministic.
// Timer-driven tests run on a paused tokio clock; sleeping advances it.

use ai_reader::{
    ConversionService, Document, FailureKind, JobController, JobPhase, JobTicket, ServiceError,
    SubmitError, TerminalOutcome, Voice,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const POLL: Duration = Duration::from_secs(1);

/// Scripted stand-in for the remote service.
#[derive(Default)]
struct ScriptedService {
    /// Tickets handed out by successive submit calls; `None` scripts a failure
    tickets: Mutex<VecDeque<Option<JobTicket>>>,
    /// Values returned by successive progress queries; `None` scripts a query error
    progress: Mutex<VecDeque<Option<i64>>>,
    submit_calls: AtomicUsize,
    progress_calls: AtomicUsize,
}

impl ScriptedService {
    fn push_ticket(&self, job_id: &str) {
        self.tickets.lock().unwrap().push_back(Some(JobTicket {
            job_id: job_id.to_string(),
            audio_url: format!("/audio/{}", job_id),
        }));
    }

    fn push_submit_failure(&self) {
        self.tickets.lock().unwrap().push_back(None);
    }

    fn push_progress(&self, values: &[i64]) {
        let mut progress = self.progress.lock().unwrap();
        for value in values {
            progress.push_back(Some(*value));
        }
    }

    fn push_query_failure(&self) {
        self.progress.lock().unwrap().push_back(None);
    }

    fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn progress_calls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionService for ScriptedService {
    async fn submit(&self, _document: &Document, _voice: Voice) -> Result<JobTicket, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        match self.tickets.lock().unwrap().pop_front() {
            Some(Some(ticket)) => Ok(ticket),
            _ => Err(ServiceError::Api {
                status: 500,
                body: "scripted submit failure".to_string(),
            }),
        }
    }

    async fn progress(&self, _job_id: &str) -> Result<i64, ServiceError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        match self.progress.lock().unwrap().pop_front() {
            Some(Some(value)) => Ok(value),
            _ => Err(ServiceError::Api {
                status: 502,
                body: "scripted query failure".to_string(),
            }),
        }
    }
}

fn doc() -> Document {
    Document::new("doc.pdf", b"%PDF-1.4 sample".to_vec())
}

fn setup() -> (Arc<ScriptedService>, JobController) {
    let service = Arc::new(ScriptedService::default());
    let controller = JobController::new(service.clone(), POLL);
    (service, controller)
}

#[tokio::test]
async fn test_empty_document_is_rejected_without_network_call() {
    let (service, controller) = setup();

    let err = controller
        .submit(Document::new("doc.pdf", Vec::new()), Voice::Ash)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::EmptyDocument));
    assert_eq!(service.submit_calls(), 0, "No request should be issued");

    // State untouched: still the initial idle snapshot.
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Idle);
    assert_eq!(snapshot.progress, 0);
    assert!(snapshot.job.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_successful_submission_enters_polling() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");

    let job = controller.submit(doc(), Voice::Ash).await?;

    assert_eq!(job.id, "J1");
    assert_eq!(job.audio_url, "/audio/J1");
    assert_eq!(job.voice, Voice::Ash);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Polling);
    assert_eq!(snapshot.progress, 0);
    assert_eq!(snapshot.job.as_ref().unwrap().id, "J1");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_polling_to_success() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_progress(&[42, 100]);

    controller.submit(doc(), Voice::Ash).await?;

    sleep(Duration::from_millis(1100)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Polling);
    assert_eq!(snapshot.progress, 42);

    sleep(Duration::from_secs(1)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Succeeded);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(service.progress_calls(), 2);

    // The session is gone: no third query, ever.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(service.progress_calls(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_service_reported_failure() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_progress(&[-1]);

    controller.submit(doc(), Voice::Verse).await?;

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(
        controller.snapshot().phase,
        JobPhase::Failed(FailureKind::Generation)
    );
    assert_eq!(service.progress_calls(), 1);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(service.progress_calls(), 1, "Session must stop on failure");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_query_error_is_terminal() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_query_failure();

    controller.submit(doc(), Voice::Ash).await?;

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(
        controller.snapshot().phase,
        JobPhase::Failed(FailureKind::Communication)
    );

    sleep(Duration::from_secs(3)).await;
    assert_eq!(service.progress_calls(), 1, "No retries after a query error");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_progress_is_a_communication_failure() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_progress(&[123]);

    controller.submit(doc(), Voice::Ash).await?;

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(
        controller.snapshot().phase,
        JobPhase::Failed(FailureKind::Communication)
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_never_polls() {
    let (service, controller) = setup();
    service.push_submit_failure();

    let err = controller.submit(doc(), Voice::Ash).await.unwrap_err();
    assert!(matches!(err, SubmitError::Service(_)));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Failed(FailureKind::Upload));
    assert!(snapshot.job.is_none());

    // No session was created for the failed attempt.
    sleep(Duration::from_secs(3)).await;
    assert_eq!(service.progress_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_replaces_job_and_session() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_progress(&[10]);

    controller.submit(doc(), Voice::Ash).await?;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(controller.snapshot().progress, 10);

    // Resubmit while J1 is still polling.
    service.push_ticket("J2");
    service.push_progress(&[55, 100]);
    let job = controller.submit(doc(), Voice::Sage).await?;
    assert_eq!(job.id, "J2");

    // The new attempt starts from scratch.
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Polling);
    assert_eq!(snapshot.progress, 0);
    assert_eq!(snapshot.job.as_ref().unwrap().id, "J2");

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(controller.snapshot().progress, 55);

    sleep(Duration::from_secs(1)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Succeeded);
    assert_eq!(snapshot.job.as_ref().unwrap().id, "J2");

    // One query for J1, two for J2; the stale session issued nothing more.
    assert_eq!(service.progress_calls(), 3);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stale_terminal_report_is_ignored() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");

    controller.submit(doc(), Voice::Ash).await?;

    controller
        .on_terminal("stale-job", TerminalOutcome::Completed)
        .await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Polling);
    assert_eq!(snapshot.job.as_ref().unwrap().id, "J1");

    controller.on_terminal("J1", TerminalOutcome::Completed).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Succeeded);
    assert_eq!(snapshot.progress, 100);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_injected_terminal_outcomes_map_to_failure_kinds() -> Result<()> {
    let (service, controller) = setup();

    service.push_ticket("J1");
    controller.submit(doc(), Voice::Ash).await?;
    controller
        .on_terminal("J1", TerminalOutcome::ServiceFailure)
        .await;
    assert_eq!(
        controller.snapshot().phase,
        JobPhase::Failed(FailureKind::Generation)
    );

    service.push_ticket("J2");
    controller.submit(doc(), Voice::Ash).await?;
    controller
        .on_terminal("J2", TerminalOutcome::QueryFailure)
        .await;
    assert_eq!(
        controller.snapshot().phase,
        JobPhase::Failed(FailureKind::Communication)
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_job_and_stops_polling() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_progress(&[10, 20, 30]);

    controller.submit(doc(), Voice::Ash).await?;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(controller.snapshot().progress, 10);

    controller.reset().await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, JobPhase::Idle);
    assert_eq!(snapshot.progress, 0);
    assert!(snapshot.job.is_none());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(service.progress_calls(), 1, "Reset must stop the session");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_controller_stops_polling() -> Result<()> {
    let (service, controller) = setup();
    service.push_ticket("J1");
    service.push_progress(&[10, 20, 30, 40]);

    controller.submit(doc(), Voice::Ash).await?;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(service.progress_calls(), 1);

    drop(controller);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(service.progress_calls(), 1, "Teardown must stop the session");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_after_failure_is_allowed() -> Result<()> {
    let (service, controller) = setup();

    service.push_submit_failure();
    assert!(controller.submit(doc(), Voice::Ash).await.is_err());
    assert_eq!(
        controller.snapshot().phase,
        JobPhase::Failed(FailureKind::Upload)
    );

    service.push_ticket("J2");
    let job = controller.submit(doc(), Voice::Alloy).await?;
    assert_eq!(job.id, "J2");
    assert_eq!(controller.snapshot().phase, JobPhase::Polling);

    Ok(())
}
