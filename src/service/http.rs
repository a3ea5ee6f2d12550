use async_trait::async_trait;
use reqwest::multipart;
use std::time::Duration;
use tracing::debug;

use super::types::{Document, JobTicket, ProgressMessage, Voice};
use super::ConversionService;

/// Errors from the conversion service HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request failed in transit (network, timeout, TLS) or the
    /// response body did not match the expected shape.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status code.
    #[error("service error ({status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },
}

/// HTTP client for one conversion service instance.
pub struct HttpConversionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConversionService {
    /// Create a client for the service at `base_url`
    /// (e.g. `http://localhost:8000`). Every request carries
    /// `request_timeout` so a hung service ends the attempt instead of
    /// stalling it forever.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Base URL of the service this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an artifact location against the service base URL. The
    /// service hands out paths like `/audio/{id}`; absolute URLs pass
    /// through unchanged.
    pub fn artifact_url(&self, audio_url: &str) -> String {
        if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
            audio_url.to_string()
        } else {
            format!("{}{}", self.base_url, audio_url)
        }
    }

    /// Download the finished audio artifact.
    pub async fn fetch_artifact(&self, audio_url: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.artifact_url(audio_url);
        debug!("Fetching artifact from {}", url);

        let response = self.client.get(&url).send().await?;
        let response = Self::ensure_success(response).await?;

        Ok(response.bytes().await?.to_vec())
    }

    /// Ensure the response has a success status code, or convert it into
    /// a [`ServiceError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn submit(&self, document: &Document, voice: Voice) -> Result<JobTicket, ServiceError> {
        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(document.content.clone())
                    .file_name(document.file_name.clone()),
            )
            .text("voice", voice.as_str());

        let response = self
            .client
            .post(format!("{}/upload/", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let ticket = response.json::<JobTicket>().await?;

        debug!("Submission accepted as job {}", ticket.job_id);

        Ok(ticket)
    }

    async fn progress(&self, job_id: &str) -> Result<i64, ServiceError> {
        let response = self
            .client
            .get(format!("{}/progress/{}", self.base_url, job_id))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let message = response.json::<ProgressMessage>().await?;

        Ok(message.progress)
    }
}
