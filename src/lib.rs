//! # molsnap
//!
//! Client for turning images of chemical structures into machine-readable
//! notations (SMILES, SELFIES) via a pair of remote recognition services.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Intake    accept image/* or application/pdf, count PDF pages
//!  ├─ 2. Parse     (PDF only) segment a page range into structure images
//!  ├─ 3. Select    pick segment images and a model checkpoint
//!  ├─ 4. Convert   one request per conversion, gated by the loading flag
//!  ├─ 5. Aggregate validate records, mean atom confidence, status
//!  └─ 6. Present   results table, summary, clipboard copy, CSV export
//! ```
//!
//! The segmentation service (`DECIMER_API_URL`) extracts structure images
//! from PDFs and serves them as static assets; the prediction service
//! (`MOLSNAP_API_URL`) recognises structures in an uploaded image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use molsnap::{ClientConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(ClientConfig::from_env()?)?;
//!     session.select_path("benzoic_acid.png")?;
//!     for r in session.convert().await? {
//!         println!("{}\t{}\t{:?}", r.file_name, r.smiles, r.confidence);
//!     }
//!     session.export_csv(".").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `molsnap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! molsnap = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregate;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod export;
pub mod intake;
pub mod parse;
pub mod payload;
pub mod progress;
pub mod service;
pub mod session;
pub mod state;
pub mod summary;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aggregate::{aggregate, mean_confidence, ConversionResult, ResultStatus, StructureFormat};
pub use clipboard::{Clipboard, CopyField, CopyKey, MemoryClipboard, SystemClipboard};
pub use config::{ClientConfig, ClientConfigBuilder, PredictionEndpoint};
pub use error::{ClipboardError, IntakeError, MolSnapError, ParseError, ValidationError};
pub use export::{export_to_file, to_csv_string, write_csv};
pub use intake::{FileCandidate, UploadSelection};
pub use parse::ParsePreview;
pub use payload::{ExtractedSegments, PredictionRecord, RawPrediction};
pub use progress::{NoopObserver, ObserverHandle, SessionObserver};
pub use service::{HttpRecognitionService, RecognitionService, UploadFile};
pub use session::Session;
pub use state::{AppState, Screen};
pub use summary::ResultsSummary;
pub use viewer::{ViewerAction, ViewerState};
