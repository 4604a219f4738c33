//! Error types for the molsnap library.
//!
//! One fatal error type and several narrow ones:
//!
//! * [`MolSnapError`]: the outcome of a failed session operation (upload,
//!   extraction, conversion, export). Every async boundary returns it.
//!
//! * [`IntakeError`], [`ParseError`], [`ValidationError`] and
//!   [`ClipboardError`]: failures of a single stage. They convert into
//!   [`MolSnapError`] with `?` so callers can match either the narrow or the
//!   wide type.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the molsnap library.
#[derive(Debug, Error)]
pub enum MolSnapError {
    // ── Stage errors ──────────────────────────────────────────────────────
    /// The offered file was not accepted.
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// The page range or parse trigger was refused.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The prediction payload did not match the expected schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Copying a result field failed.
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    // ── Session errors ────────────────────────────────────────────────────
    /// A conversion is already running; the new one was not started.
    #[error("A conversion is already in progress; wait for it to finish")]
    ConversionInFlight,

    /// Convert or parse was requested before any file was selected.
    #[error("No file selected.\nSelect an image or PDF first.")]
    NoFileSelected,

    /// Batch conversion was requested with an empty image selection.
    #[error("No segment images selected")]
    NothingSelected,

    /// Navigation is refused while a conversion is loading.
    #[error("Cannot navigate while a conversion is loading")]
    NavigationBlocked,

    /// No result row has this id.
    #[error("No result with id '{id}'")]
    UnknownResult { id: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// The request never produced an HTTP response.
    #[error("Request to '{url}' failed: {reason}\nCheck that the service is running.")]
    Transport { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s\nIncrease --timeout.")]
    Timeout { url: String, secs: u64 },

    /// The service answered with a non-success HTTP status.
    #[error("Service at '{url}' returned HTTP {status}: {body}")]
    ServerStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The service answered 200 but reported a failure in its body.
    #[error("Service reported an error: {message}")]
    Service { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the input file.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MolSnapError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Transport failures, timeouts and 5xx / 429 answers are transient;
    /// everything else is a property of the input or configuration.
    pub fn is_transient(&self) -> bool {
        match self {
            MolSnapError::Transport { .. } | MolSnapError::Timeout { .. } => true,
            MolSnapError::ServerStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Rejection of a candidate file at intake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    /// MIME type is neither `image/*` nor `application/pdf`.
    #[error("Unsupported file type '{mime_type}' for '{file_name}'\nSupported: PDF, PNG, JPG, JPEG.")]
    UnsupportedType {
        file_name: String,
        mime_type: String,
    },

    /// Declared as a PDF but could not be parsed.
    #[error("PDF '{file_name}' is corrupt: {detail}")]
    CorruptPdf { file_name: String, detail: String },

    /// Zero-byte file.
    #[error("File '{file_name}' is empty")]
    Empty { file_name: String },
}

/// Refusal of a parse-configuration change or parse trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid page range {start}-{end}: pages must satisfy 1 <= start <= end <= {max}")]
    InvalidRange { start: usize, end: usize, max: usize },

    #[error("A parse is already running")]
    Busy,

    #[error("Page extraction only applies to PDF files, got '{mime_type}'")]
    NotAPdf { mime_type: String },

    #[error("'{file_name}' was replaced while its pages were being extracted; segments discarded")]
    FileReplaced { file_name: String },
}

/// A raw prediction record that violates the service schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Prediction payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("Prediction record {index}: missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Prediction record {index}: atom confidence {value} is outside [0, 1]")]
    ConfidenceOutOfRange { index: usize, value: f64 },

    #[error("Prediction record {index}: processing time {value} is not a finite, non-negative number")]
    InvalidProcessingTime { index: usize, value: f64 },
}

/// Failure writing to the system clipboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Clipboard write failed: {reason}")]
pub struct ClipboardError {
    pub reason: String,
}
