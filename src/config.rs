//! Configuration for talking to the recognition services.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via
//! its [`ClientConfigBuilder`] or read from the environment with
//! [`ClientConfig::from_env`]. The base URLs have no committed defaults;
//! they must be supplied by whoever deploys the client.

use crate::error::MolSnapError;
use crate::progress::ObserverHandle;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the segmentation / static-asset service URL.
pub const DECIMER_URL_ENV: &str = "DECIMER_API_URL";
/// Environment variable holding the prediction service URL.
pub const MOLSNAP_URL_ENV: &str = "MOLSNAP_API_URL";
/// Optional override of the default model checkpoint.
pub const MODEL_ENV: &str = "MOLSNAP_MODEL";
/// Optional override of the per-request timeout.
pub const TIMEOUT_ENV: &str = "MOLSNAP_TIMEOUT_SECS";

/// Checkpoint the prediction service loads when nothing else is chosen.
pub const DEFAULT_MODEL: &str = "molnextr_best.pth";

/// Configuration for a [`crate::service::HttpRecognitionService`] and the
/// [`crate::session::Session`] that drives it.
///
/// # Example
/// ```rust
/// use molsnap::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .decimer_url("http://localhost:8001")
///     .molsnap_url("http://localhost:8000")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.decimer_url.as_str(), "http://localhost:8001/");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the segmentation service. Also serves segment images
    /// as static assets under `{decimer_url}/{path}`.
    pub decimer_url: Url,

    /// Base URL of the prediction service.
    pub molsnap_url: Url,

    /// Model checkpoint selected when the user has not chosen one.
    pub default_model: String,

    /// Which prediction route single-file conversion posts to. Default: [`PredictionEndpoint::Full`].
    pub prediction_endpoint: PredictionEndpoint,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// Segmentation of a multi-page PDF runs a model on every page, so the
    /// extraction call is the slowest one; 120 s covers the 20-page cap.
    pub request_timeout_secs: u64,

    /// Retry attempts on a transient failure. Default: 0 (no retry).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Concurrent segment-image downloads during batch conversion. Default: 4.
    pub fetch_concurrency: usize,

    /// Optional observer notified of loading and parse transitions.
    pub observer: Option<ObserverHandle>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("decimer_url", &self.decimer_url.as_str())
            .field("molsnap_url", &self.molsnap_url.as_str())
            .field("default_model", &self.default_model)
            .field("prediction_endpoint", &self.prediction_endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder. Both base URLs must be set before `build()`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Read the configuration from `DECIMER_API_URL`, `MOLSNAP_API_URL` and
    /// the optional `MOLSNAP_MODEL` / `MOLSNAP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, MolSnapError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var(DECIMER_URL_ENV) {
            builder = builder.decimer_url(url);
        }
        if let Ok(url) = std::env::var(MOLSNAP_URL_ENV) {
            builder = builder.molsnap_url(url);
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                builder = builder.default_model(model.trim());
            }
        }
        if let Ok(secs) = std::env::var(TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                MolSnapError::InvalidConfig(format!("{TIMEOUT_ENV} must be an integer, got '{secs}'"))
            })?;
            builder = builder.request_timeout_secs(secs);
        }
        builder.build()
    }

    /// Endpoint for uploading a PDF and receiving segment image paths.
    pub fn extraction_url(&self) -> String {
        join_url(&self.decimer_url, "upload-and-get-chemical-images")
    }

    /// Endpoint for single-file prediction.
    pub fn prediction_url(&self) -> String {
        join_url(&self.molsnap_url, self.prediction_endpoint.path())
    }

    /// Endpoint for multi-file prediction.
    pub fn batch_prediction_url(&self) -> String {
        join_url(&self.molsnap_url, "predictions")
    }

    /// Public URL of a segment image or uploaded file path.
    pub fn asset_url(&self, path: &str) -> String {
        join_url(&self.decimer_url, path)
    }
}

/// Join a base URL and a relative path with exactly one `/` between them.
pub fn join_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    decimer_url: Option<String>,
    molsnap_url: Option<String>,
    default_model: Option<String>,
    prediction_endpoint: PredictionEndpoint,
    request_timeout_secs: Option<u64>,
    max_retries: u32,
    retry_backoff_ms: Option<u64>,
    fetch_concurrency: Option<usize>,
    observer: Option<ObserverHandleDebug>,
}

// Wrapper so the builder can keep deriving Debug.
struct ObserverHandleDebug(ObserverHandle);

impl fmt::Debug for ObserverHandleDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<dyn SessionObserver>")
    }
}

impl ClientConfigBuilder {
    pub fn decimer_url(mut self, url: impl Into<String>) -> Self {
        self.decimer_url = Some(url.into());
        self
    }

    pub fn molsnap_url(mut self, url: impl Into<String>) -> Self {
        self.molsnap_url = Some(url.into());
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn prediction_endpoint(mut self, endpoint: PredictionEndpoint) -> Self {
        self.prediction_endpoint = endpoint;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs.max(1));
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = Some(ms);
        self
    }

    pub fn fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = Some(n.max(1));
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(ObserverHandleDebug(observer));
        self
    }

    /// Build the configuration, validating both base URLs.
    pub fn build(self) -> Result<ClientConfig, MolSnapError> {
        let decimer_url = parse_base_url(DECIMER_URL_ENV, self.decimer_url)?;
        let molsnap_url = parse_base_url(MOLSNAP_URL_ENV, self.molsnap_url)?;

        let default_model = self.default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if default_model.trim().is_empty() {
            return Err(MolSnapError::InvalidConfig("model id must not be empty".into()));
        }

        Ok(ClientConfig {
            decimer_url,
            molsnap_url,
            default_model,
            prediction_endpoint: self.prediction_endpoint,
            request_timeout_secs: self.request_timeout_secs.unwrap_or(120),
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms.unwrap_or(500),
            fetch_concurrency: self.fetch_concurrency.unwrap_or(4),
            observer: self.observer.map(|o| o.0),
        })
    }
}

fn parse_base_url(name: &str, value: Option<String>) -> Result<Url, MolSnapError> {
    let raw = value.ok_or_else(|| {
        MolSnapError::InvalidConfig(format!("{name} is not set; no default base URL is provided"))
    })?;
    let url = Url::parse(raw.trim())
        .map_err(|e| MolSnapError::InvalidConfig(format!("{name} '{raw}' is not a valid URL: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(MolSnapError::InvalidConfig(format!(
            "{name} must be an http(s) URL, got '{raw}'"
        )));
    }
    Ok(url)
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Prediction route for single-file conversion.
///
/// `Full` stores the upload on the service side before predicting;
/// `Only` runs the model without keeping the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PredictionEndpoint {
    #[default]
    Full,
    Only,
}

impl PredictionEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            PredictionEndpoint::Full => "prediction",
            PredictionEndpoint::Only => "prediction-only",
        }
    }
}
