//! Client interface to the remote conversion service
//!
//! This module provides the seam between the job lifecycle and the
//! external document-to-audio conversion service:
//! - `ConversionService` - the trait the job controller and poller call
//! - `HttpConversionService` - production implementation over HTTP
//! - Wire types for the submit and progress endpoints

mod http;
mod types;

pub use http::{HttpConversionService, ServiceError};
pub use types::{Document, JobTicket, ProgressMessage, Voice};

use async_trait::async_trait;

/// Interface to the remote conversion service.
///
/// Mirrors the two endpoints the service exposes: document submission and
/// progress query. Implementations are shared across tasks behind an `Arc`.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Submit a document for conversion. Returns the accepted job's ticket.
    async fn submit(&self, document: &Document, voice: Voice) -> Result<JobTicket, ServiceError>;

    /// Query the current progress of a job. Returns the raw value as the
    /// service reported it; interpretation is left to the caller.
    async fn progress(&self, job_id: &str) -> Result<i64, ServiceError>;
}
