//! Image selection container: extracted segment images, which of them are
//! selected, and the model they will be sent to.
//!
//! "Select all" and "Deselect all" share one control. Which one it means
//! is decided from cardinality by [`ToggleAll::for_state`] and then applied
//! as an explicit operation, so the branch is visible to callers and tests.

use crate::config::DEFAULT_MODEL;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    /// Segment image paths in extraction order. Appended to, never reordered.
    pub candidates: Vec<String>,
    /// Selected paths in the order they were selected.
    pub selected: Vec<String>,
    pub model_id: String,
    /// Checkpoints the extraction service reported as available.
    pub checkpoints: Vec<String>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::with_model(DEFAULT_MODEL)
    }
}

impl SelectionState {
    pub fn with_model(model_id: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            selected: Vec::new(),
            model_id: model_id.into(),
            checkpoints: Vec::new(),
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    /// Selected paths in candidate order, as they are sent for conversion.
    /// A path extracted more than once is sent once.
    pub fn selected_in_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.candidates
            .iter()
            .filter(|c| self.is_selected(c) && seen.insert(*c))
            .cloned()
            .collect()
    }
}

/// The two meanings of the select-all control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAll {
    SelectAll,
    DeselectAll,
}

impl ToggleAll {
    /// `DeselectAll` when every candidate is selected, `SelectAll` otherwise.
    pub fn for_state(state: &SelectionState) -> Self {
        if state.selected.len() == state.candidates.len() {
            ToggleAll::DeselectAll
        } else {
            ToggleAll::SelectAll
        }
    }

    /// Label shown on the control.
    pub fn label(self) -> &'static str {
        match self {
            ToggleAll::SelectAll => "Select All",
            ToggleAll::DeselectAll => "Deselect All",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SelectionAction {
    AppendCandidates(Vec<String>),
    Toggle(String),
    ToggleAll(ToggleAll),
    SetModel(String),
    SetCheckpoints(Vec<String>),
    /// Drop candidates and selection; keep the model.
    ClearImages,
}

pub fn reduce(mut state: SelectionState, action: SelectionAction) -> SelectionState {
    match action {
        SelectionAction::AppendCandidates(images) => {
            state.candidates.extend(images);
        }
        SelectionAction::Toggle(id) => {
            if state.selected.contains(&id) {
                state.selected.retain(|s| *s != id);
            } else if state.candidates.contains(&id) {
                state.selected.push(id);
            }
        }
        SelectionAction::ToggleAll(ToggleAll::SelectAll) => {
            state.selected = state.candidates.clone();
        }
        SelectionAction::ToggleAll(ToggleAll::DeselectAll) => {
            state.selected.clear();
        }
        SelectionAction::SetModel(model_id) => {
            state.model_id = model_id;
        }
        SelectionAction::SetCheckpoints(checkpoints) => {
            state.checkpoints = checkpoints;
        }
        SelectionAction::ClearImages => {
            state.candidates.clear();
            state.selected.clear();
        }
    }
    state
}
