//! Clipboard copy of result fields and the transient "copied" indicator.
//!
//! Only one indicator is visible at a time, keyed by result id and field,
//! for [`COPY_INDICATOR`] after a successful copy. A failed copy returns a
//! [`ClipboardError`] and leaves the indicator untouched.

use crate::aggregate::ConversionResult;
use crate::error::ClipboardError;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long the "copied" indicator stays visible.
pub const COPY_INDICATOR: Duration = Duration::from_secs(2);

/// Copyable columns of a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyField {
    Smiles,
    Selfies,
}

impl CopyField {
    pub fn value(self, result: &ConversionResult) -> &str {
        match self {
            CopyField::Smiles => &result.smiles,
            CopyField::Selfies => &result.selfies,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            CopyField::Smiles => "smiles",
            CopyField::Selfies => "selfies",
        }
    }
}

/// Identifies one copy indicator: `"<result id>-<field>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CopyKey {
    pub result_id: String,
    pub field: CopyField,
}

impl CopyKey {
    pub fn new(result_id: impl Into<String>, field: CopyField) -> Self {
        Self {
            result_id: result_id.into(),
            field,
        }
    }
}

impl fmt::Display for CopyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.result_id, self.field.suffix())
    }
}

/// Tracks which field was copied last and when.
#[derive(Debug, Default)]
pub struct CopyTracker {
    last: Option<(CopyKey, Instant)>,
}

impl CopyTracker {
    pub fn mark(&mut self, key: CopyKey, now: Instant) {
        self.last = Some((key, now));
    }

    /// The key whose indicator is visible at `now`, if any.
    pub fn current(&self, now: Instant) -> Option<&CopyKey> {
        self.last
            .as_ref()
            .filter(|(_, at)| now.saturating_duration_since(*at) < COPY_INDICATOR)
            .map(|(key, _)| key)
    }

    pub fn is_copied(&self, key: &CopyKey, now: Instant) -> bool {
        self.current(now) == Some(key)
    }
}

/// Destination for copied text.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard that keeps the last copied text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
        Ok(())
    }
}

/// The system clipboard.
///
/// The handle is opened once and kept for the life of the value; on X11 the
/// copied text is only served while a handle is alive.
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = arboard::Clipboard::new().map_err(ClipboardError::from)?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

impl fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClipboard").finish_non_exhaustive()
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_text(text)
            .map_err(ClipboardError::from)
    }
}

impl From<arboard::Error> for ClipboardError {
    fn from(e: arboard::Error) -> Self {
        ClipboardError {
            reason: e.to_string(),
        }
    }
}
