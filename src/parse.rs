//! Parse configuration: which PDF pages are sent for segment extraction.
//!
//! The page selectors offer `1..=20`. When the document's real page count is
//! known the range is bounded by it as well, so a 3-page PDF cannot ask for
//! page 12.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};

/// Highest page number the selectors offer.
pub const MAX_SELECTABLE_PAGE: usize = 20;

/// Page range and file type of the pending extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsePreview {
    pub file_type: String,
    pub start_page: usize,
    pub end_page: usize,
}

impl Default for ParsePreview {
    fn default() -> Self {
        Self {
            file_type: String::new(),
            start_page: 1,
            end_page: 2,
        }
    }
}

impl ParsePreview {
    /// Check `1 <= start <= end <= bound`.
    pub fn validate(&self, page_count: Option<usize>) -> Result<(), ParseError> {
        let max = *selectable_pages(page_count).end();
        if self.start_page < 1 || self.end_page < self.start_page || self.end_page > max {
            return Err(ParseError::InvalidRange {
                start: self.start_page,
                end: self.end_page,
                max,
            });
        }
        Ok(())
    }

    /// Number of pages the range covers.
    pub fn page_span(&self) -> usize {
        self.end_page.saturating_sub(self.start_page) + 1
    }
}

/// Pages the selectors may offer for a document.
pub fn selectable_pages(page_count: Option<usize>) -> RangeInclusive<usize> {
    let max = match page_count {
        Some(n) if n >= 1 => n.min(MAX_SELECTABLE_PAGE),
        _ => MAX_SELECTABLE_PAGE,
    };
    1..=max
}

/// Parse a `"3-7"` or `"5"` page-range string.
pub fn parse_page_range(s: &str) -> Result<(usize, usize), ParseError> {
    let invalid = || ParseError::InvalidRange {
        start: 0,
        end: 0,
        max: MAX_SELECTABLE_PAGE,
    };
    let s = s.trim();
    match s.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse().map_err(|_| invalid())?;
            let end = end.trim().parse().map_err(|_| invalid())?;
            Ok((start, end))
        }
        None => {
            let page = s.parse().map_err(|_| invalid())?;
            Ok((page, page))
        }
    }
}

/// Re-entrancy flag for an operation that must not overlap itself.
///
/// [`BusyFlag::try_begin`] hands out at most one [`BusyGuard`] at a time;
/// dropping the guard clears the flag, whichever way the operation ended.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears its [`BusyFlag`] on drop.
#[derive(Debug)]
pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
