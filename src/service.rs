//! HTTP boundary to the segmentation and prediction services.
//!
//! [`RecognitionService`] is the seam the session talks through; the
//! production implementation is [`HttpRecognitionService`], and tests swap
//! in an in-memory one.
//!
//! ## Retry Strategy
//!
//! Off by default. With `max_retries > 0`, transient failures (transport
//! errors, timeouts, 429 and 5xx) are retried after
//! `retry_backoff_ms * 2^attempt`. Multipart bodies are rebuilt for every
//! attempt because a sent form cannot be replayed.

use crate::config::ClientConfig;
use crate::error::MolSnapError;
use crate::intake::{detect_mime, UploadSelection};
use crate::payload::{parse_extraction_body, parse_prediction_body, ExtractedSegments, PredictionRecord};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Longest response-body excerpt kept in a [`MolSnapError::ServerStatus`].
const BODY_EXCERPT_LEN: usize = 200;

/// A file as it travels in a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl From<&UploadSelection> for UploadFile {
    fn from(sel: &UploadSelection) -> Self {
        Self {
            file_name: sel.file_name.clone(),
            mime_type: sel.mime_type.clone(),
            bytes: sel.bytes.clone(),
        }
    }
}

impl UploadFile {
    fn to_part(&self) -> Result<Part, MolSnapError> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type)
            .map_err(|e| MolSnapError::Internal(format!("invalid MIME type '{}': {e}", self.mime_type)))
    }
}

/// Operations the recognition backend offers.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Upload a PDF and segment `start_page..=end_page` into structure images.
    async fn extract_segments(
        &self,
        file: &UploadFile,
        start_page: usize,
        end_page: usize,
    ) -> Result<ExtractedSegments, MolSnapError>;

    /// Recognise the structure(s) in one uploaded file.
    async fn predict(&self, file: &UploadFile, model_id: &str) -> Result<Vec<PredictionRecord>, MolSnapError>;

    /// Recognise several files in one request.
    async fn predict_batch(
        &self,
        files: &[UploadFile],
        model_id: &str,
    ) -> Result<Vec<PredictionRecord>, MolSnapError>;

    /// Download a segment image previously returned by `extract_segments`.
    async fn fetch_segment(&self, path: &str) -> Result<UploadFile, MolSnapError>;
}

/// [`RecognitionService`] over `reqwest`.
pub struct HttpRecognitionService {
    client: Client,
    config: ClientConfig,
}

impl HttpRecognitionService {
    pub fn new(config: ClientConfig) -> Result<Self, MolSnapError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MolSnapError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Send the request built by `make_request`, retrying transient failures.
    async fn send_with_retry<F>(&self, url: &str, make_request: F) -> Result<Vec<u8>, MolSnapError>
    where
        F: Fn() -> Result<RequestBuilder, MolSnapError> + Send + Sync,
    {
        let mut last_err: Option<MolSnapError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = self.config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    url, attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(url, make_request()?).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() => {
                    warn!("{}: attempt {} failed: {}", url, attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| MolSnapError::Internal(format!("no attempt made for {url}"))))
    }

    async fn send_once(&self, url: &str, request: RequestBuilder) -> Result<Vec<u8>, MolSnapError> {
        let response = request.send().await.map_err(|e| self.transport_error(url, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;
        debug!("{} → HTTP {} ({} bytes)", url, status, body.len());

        if !status.is_success() {
            return Err(MolSnapError::ServerStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: body_excerpt(&body),
            });
        }
        Ok(body.to_vec())
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> MolSnapError {
        if e.is_timeout() {
            MolSnapError::Timeout {
                url: url.to_string(),
                secs: self.config.request_timeout_secs,
            }
        } else {
            MolSnapError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RecognitionService for HttpRecognitionService {
    async fn extract_segments(
        &self,
        file: &UploadFile,
        start_page: usize,
        end_page: usize,
    ) -> Result<ExtractedSegments, MolSnapError> {
        let url = self.config.extraction_url();
        info!(
            "Extracting pages {}-{} of {} via {}",
            start_page, end_page, file.file_name, url
        );
        let body = self
            .send_with_retry(&url, || {
                let form = Form::new()
                    .part("file", file.to_part()?)
                    .text("startPage", start_page.to_string())
                    .text("endPage", end_page.to_string());
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;
        let segments = parse_extraction_body(&body)?;
        info!("Extracted {} segment images", segments.images.len());
        Ok(segments)
    }

    async fn predict(&self, file: &UploadFile, model_id: &str) -> Result<Vec<PredictionRecord>, MolSnapError> {
        let url = self.config.prediction_url();
        info!("Predicting {} with {} via {}", file.file_name, model_id, url);
        let body = self
            .send_with_retry(&url, || {
                let form = Form::new()
                    .part("file", file.to_part()?)
                    .text("model", model_id.to_string());
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;
        parse_prediction_body(&body)
    }

    async fn predict_batch(
        &self,
        files: &[UploadFile],
        model_id: &str,
    ) -> Result<Vec<PredictionRecord>, MolSnapError> {
        let url = self.config.batch_prediction_url();
        info!("Predicting {} files with {} via {}", files.len(), model_id, url);
        let body = self
            .send_with_retry(&url, || {
                let mut form = Form::new().text("model", model_id.to_string());
                for file in files {
                    form = form.part("files", file.to_part()?);
                }
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;
        parse_prediction_body(&body)
    }

    async fn fetch_segment(&self, path: &str) -> Result<UploadFile, MolSnapError> {
        let url = self.config.asset_url(path);
        let bytes = self
            .send_with_retry(&url, || Ok(self.client.get(&url)))
            .await?;
        let file_name = segment_file_name(path);
        let mime_type = detect_mime(&bytes, &file_name);
        debug!("Fetched segment {} ({} bytes, {})", path, bytes.len(), mime_type);
        Ok(UploadFile {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// Last path component of a segment path.
pub fn segment_file_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("segment.png")
        .to_string()
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() <= BODY_EXCERPT_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(BODY_EXCERPT_LEN).collect();
        format!("{cut}…")
    }
}
