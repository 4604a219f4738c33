//! The upload → extract → select → convert pipeline over shared state.
//!
//! A [`Session`] owns the [`AppState`] container and the
//! [`RecognitionService`] it talks to. Methods take `&self`, so a UI can
//! hold one session and fire operations from independent event handlers;
//! the state mutex serialises every dispatch and is never held across an
//! `.await`.
//!
//! ## Conversion gate
//!
//! At most one conversion runs at a time. `convert*` flips the loading flag
//! under the lock and refuses with [`MolSnapError::ConversionInFlight`] if
//! it was already set, so a second submission issues no request and no
//! result replacement. The flag is cleared by a guard on every exit path.

use crate::aggregate::{aggregate, ConversionResult};
use crate::clipboard::{Clipboard, CopyField, CopyKey, CopyTracker};
use crate::config::ClientConfig;
use crate::error::{MolSnapError, ParseError};
use crate::export;
use crate::intake::{self, FileCandidate, UploadSelection};
use crate::parse::{BusyFlag, ParsePreview};
use crate::payload::{ExtractedSegments, PredictionRecord};
use crate::progress::SessionObserver;
use crate::service::{HttpRecognitionService, RecognitionService, UploadFile};
use crate::state::{
    Action, AppState, LoadingAction, ResultsAction, Screen, SelectionAction, ToggleAll, UploadAction,
};
use crate::summary::ResultsSummary;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

type SharedState = Arc<Mutex<AppState>>;

fn lock_state(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clears the loading flag when dropped, unless [`LoadingGuard::finish`]
/// already did so.
struct LoadingGuard {
    state: SharedState,
    armed: bool,
}

impl LoadingGuard {
    fn begin(state: &SharedState) -> Result<Self, MolSnapError> {
        let mut s = lock_state(state);
        if s.loading.is_loading {
            return Err(MolSnapError::ConversionInFlight);
        }
        s.dispatch(LoadingAction::Begin)?;
        Ok(Self {
            state: Arc::clone(state),
            armed: true,
        })
    }

    /// Clear the flag inside a critical section the caller already holds.
    fn finish(mut self, s: &mut AppState) -> Result<(), MolSnapError> {
        self.armed = false;
        s.dispatch(LoadingAction::Finish)
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.armed {
            // Finish is never refused by dispatch.
            let _ = lock_state(&self.state).dispatch(LoadingAction::Finish);
        }
    }
}

/// One user's interaction with the recognition services.
pub struct Session {
    state: SharedState,
    service: Arc<dyn RecognitionService>,
    config: ClientConfig,
    parsing: BusyFlag,
    copies: Mutex<CopyTracker>,
}

impl Session {
    /// Session over the HTTP services named in `config`.
    pub fn new(config: ClientConfig) -> Result<Self, MolSnapError> {
        let service = Arc::new(HttpRecognitionService::new(config.clone())?);
        Ok(Self::with_service(config, service))
    }

    /// Session over any service implementation.
    pub fn with_service(config: ClientConfig, service: Arc<dyn RecognitionService>) -> Self {
        let state = AppState::with_model(config.default_model.clone());
        Self {
            state: Arc::new(Mutex::new(state)),
            service,
            config,
            parsing: BusyFlag::default(),
            copies: Mutex::new(CopyTracker::default()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> AppState {
        lock_state(&self.state).clone()
    }

    /// Apply one action to the shared state.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<(), MolSnapError> {
        lock_state(&self.state).dispatch(action)
    }

    pub fn navigate(&self, screen: Screen) -> Result<(), MolSnapError> {
        self.dispatch(Action::Navigate(screen))
    }

    pub fn is_loading(&self) -> bool {
        lock_state(&self.state).loading.is_loading
    }

    pub fn is_parsing(&self) -> bool {
        self.parsing.is_busy()
    }

    pub fn results(&self) -> Vec<ConversionResult> {
        lock_state(&self.state).results.results.clone()
    }

    fn observer(&self) -> Option<&dyn SessionObserver> {
        self.config.observer.as_deref()
    }

    fn record_failure(&self, err: &MolSnapError) {
        warn!("{}", err);
        if let Some(obs) = self.observer() {
            obs.on_error(&err.to_string());
        }
        let _ = self.dispatch(Action::SetError(Some(err.to_string())));
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Accept `candidate` as the current upload, replacing any previous one.
    ///
    /// On rejection the state is unchanged and the reason is returned.
    pub fn select_file(&self, candidate: FileCandidate) -> Result<UploadSelection, MolSnapError> {
        let selection = intake::accept(candidate)?;
        self.dispatch(UploadAction::Select(selection.clone()))?;
        Ok(selection)
    }

    /// Read `path` from disk and select it.
    pub fn select_path(&self, path: impl AsRef<Path>) -> Result<UploadSelection, MolSnapError> {
        self.select_file(FileCandidate::from_path(path)?)
    }

    fn current_upload(&self) -> Result<(UploadSelection, ParsePreview, u64), MolSnapError> {
        let s = lock_state(&self.state);
        let sel = s.upload.selection.clone().ok_or(MolSnapError::NoFileSelected)?;
        Ok((sel, s.upload.preview.clone(), s.upload.generation))
    }

    // ── Parse configuration ──────────────────────────────────────────────

    /// Set the page range sent for extraction.
    pub fn set_page_range(&self, start_page: usize, end_page: usize) -> Result<(), MolSnapError> {
        let page_count = lock_state(&self.state)
            .upload
            .selection
            .as_ref()
            .and_then(|s| s.page_count);
        let candidate = ParsePreview {
            file_type: String::new(),
            start_page,
            end_page,
        };
        candidate.validate(page_count)?;
        self.dispatch(UploadAction::UpdatePreview {
            start_page: Some(start_page),
            end_page: Some(end_page),
        })
    }

    /// Send the selected page range for segment extraction.
    ///
    /// Refused with [`ParseError::Busy`] while a previous parse is pending.
    /// Extracted images are appended to the selection candidates and the
    /// reported checkpoints replace the known list.
    pub async fn parse(&self) -> Result<ExtractedSegments, MolSnapError> {
        let _busy = self.parsing.try_begin().ok_or(ParseError::Busy)?;

        let (upload, preview, generation) = self.current_upload()?;
        if !upload.is_pdf() {
            return Err(ParseError::NotAPdf {
                mime_type: upload.mime_type,
            }
            .into());
        }
        preview.validate(upload.page_count)?;

        if let Some(obs) = self.observer() {
            obs.on_parse_start(preview.start_page, preview.end_page);
        }

        let file = UploadFile::from(&upload);
        match self
            .service
            .extract_segments(&file, preview.start_page, preview.end_page)
            .await
        {
            Ok(segments) => {
                {
                    let mut s = lock_state(&self.state);
                    if s.upload.generation != generation {
                        warn!(
                            "Discarding {} segments from '{}': file replaced during extraction",
                            segments.images.len(),
                            upload.file_name
                        );
                        return Err(ParseError::FileReplaced {
                            file_name: upload.file_name,
                        }
                        .into());
                    }
                    s.dispatch(SelectionAction::AppendCandidates(segments.images.clone()))?;
                    if !segments.checkpoints.is_empty() {
                        s.dispatch(SelectionAction::SetCheckpoints(segments.checkpoints.clone()))?;
                    }
                    s.dispatch(Action::SetError(None))?;
                }
                if let Some(obs) = self.observer() {
                    obs.on_parse_complete(segments.images.len());
                }
                Ok(segments)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    // ── Image selection ──────────────────────────────────────────────────

    pub fn toggle_image(&self, id: impl Into<String>) -> Result<(), MolSnapError> {
        self.dispatch(SelectionAction::Toggle(id.into()))
    }

    /// Apply the select-all control and return which way it went.
    pub fn toggle_all(&self) -> Result<ToggleAll, MolSnapError> {
        let mut s = lock_state(&self.state);
        let op = ToggleAll::for_state(&s.selection);
        s.dispatch(SelectionAction::ToggleAll(op))?;
        Ok(op)
    }

    pub fn set_model(&self, model_id: impl Into<String>) -> Result<(), MolSnapError> {
        self.dispatch(SelectionAction::SetModel(model_id.into()))
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Convert the uploaded file itself.
    pub async fn convert(&self) -> Result<Vec<ConversionResult>, MolSnapError> {
        let guard = LoadingGuard::begin(&self.state)?;
        let outcome = async {
            let (upload, _, _) = self.current_upload()?;
            let model = lock_state(&self.state).selection.model_id.clone();
            if let Some(obs) = self.observer() {
                obs.on_conversion_start(1);
            }
            self.service.predict(&UploadFile::from(&upload), &model).await
        }
        .await;
        self.finish_conversion(guard, outcome)
    }

    /// Download the selected segment images and convert them in one batch.
    pub async fn convert_selected(&self) -> Result<Vec<ConversionResult>, MolSnapError> {
        let guard = LoadingGuard::begin(&self.state)?;
        let outcome = async {
            let (paths, model) = {
                let s = lock_state(&self.state);
                (s.selection.selected_in_order(), s.selection.model_id.clone())
            };
            if paths.is_empty() {
                return Err(MolSnapError::NothingSelected);
            }
            if let Some(obs) = self.observer() {
                obs.on_conversion_start(paths.len());
            }
            let files = self.fetch_segments(&paths).await?;
            self.service.predict_batch(&files, &model).await
        }
        .await;
        self.finish_conversion(guard, outcome)
    }

    async fn fetch_segments(&self, paths: &[String]) -> Result<Vec<UploadFile>, MolSnapError> {
        let total = paths.len();
        stream::iter(paths.iter().enumerate().map(|(index, path)| async move {
            let file = self.service.fetch_segment(path).await?;
            if let Some(obs) = self.observer() {
                obs.on_segment_fetched(path, index, total);
            }
            Ok::<_, MolSnapError>(file)
        }))
        .buffered(self.config.fetch_concurrency)
        .try_collect()
        .await
    }

    /// Replace results while still loading, then release the gate.
    fn finish_conversion(
        &self,
        guard: LoadingGuard,
        outcome: Result<Vec<PredictionRecord>, MolSnapError>,
    ) -> Result<Vec<ConversionResult>, MolSnapError> {
        match outcome {
            Ok(records) => {
                let started = Instant::now();
                let results = aggregate(records, &self.config.decimer_url);
                debug!("Aggregated {} results in {:?}", results.len(), started.elapsed());
                {
                    let mut s = lock_state(&self.state);
                    s.dispatch(ResultsAction::Replace(results.clone()))?;
                    s.dispatch(Action::SetError(None))?;
                    guard.finish(&mut s)?;
                    s.dispatch(Action::Navigate(Screen::Results))?;
                }
                info!("Conversion complete: {} results", results.len());
                if let Some(obs) = self.observer() {
                    obs.on_conversion_complete(results.len());
                }
                Ok(results)
            }
            Err(e) => {
                drop(guard);
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    // ── Presentation ─────────────────────────────────────────────────────

    pub fn summary(&self) -> ResultsSummary {
        ResultsSummary::from_results(&lock_state(&self.state).results.results)
    }

    /// Copy one field of a result and light its indicator.
    pub fn copy_field(
        &self,
        clipboard: &dyn Clipboard,
        result_id: &str,
        field: CopyField,
    ) -> Result<CopyKey, MolSnapError> {
        let text = {
            let s = lock_state(&self.state);
            let result = s
                .results
                .results
                .iter()
                .find(|r| r.id == result_id)
                .ok_or_else(|| MolSnapError::UnknownResult {
                    id: result_id.to_string(),
                })?;
            field.value(result).to_string()
        };
        if let Err(e) = clipboard.copy(&text) {
            warn!("{}", e);
            return Err(e.into());
        }
        let key = CopyKey::new(result_id, field);
        self.copies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .mark(key.clone(), Instant::now());
        Ok(key)
    }

    /// Whether the indicator for `key` is visible now.
    pub fn is_copied(&self, key: &CopyKey) -> bool {
        self.copies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_copied(key, Instant::now())
    }

    /// Results as CSV text.
    pub fn export_csv_string(&self) -> Result<String, MolSnapError> {
        export::to_csv_string(&self.results()).map_err(|e| MolSnapError::Internal(e.to_string()))
    }

    /// Write the results CSV to `path` (a directory gets the default name).
    pub async fn export_csv(&self, path: impl AsRef<Path>) -> Result<PathBuf, MolSnapError> {
        let results = self.results();
        export::export_to_file(&results, path).await
    }
}
