//! Application state: one container per domain, each with a pure reducer.
//!
//! ```text
//!            ┌── upload     (file, parse preview)
//! AppState ──┼── selection  (segment images, model)
//!            ├── loading    (conversion in flight)
//!            ├── results    (result table)
//!            └── screen, last_error
//! ```
//!
//! Every reducer has the shape `fn reduce(old, action) -> new` and can be
//! tested without any I/O. [`AppState::dispatch`] is the only way the
//! session mutates state; it refuses navigation while a conversion is
//! loading and otherwise applies [`reduce`].

pub mod loading;
pub mod results;
pub mod selection;
pub mod upload;

use crate::error::MolSnapError;
pub use loading::{LoadingAction, LoadingState};
pub use results::{ResultsAction, ResultsState};
pub use selection::{SelectionAction, SelectionState, ToggleAll};
use serde::{Deserialize, Serialize};
pub use upload::{UploadAction, UploadState};

/// Which view the user is on. Mirrors the routes `/`, `/upload`, `/results`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    #[default]
    Landing,
    Upload,
    Results,
}

impl Screen {
    pub fn route(self) -> &'static str {
        match self {
            Screen::Landing => "/",
            Screen::Upload => "/upload",
            Screen::Results => "/results",
        }
    }

    pub fn from_route(route: &str) -> Option<Self> {
        match route {
            "/" => Some(Screen::Landing),
            "/upload" => Some(Screen::Upload),
            "/results" => Some(Screen::Results),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub upload: UploadState,
    pub selection: SelectionState,
    pub loading: LoadingState,
    pub results: ResultsState,
    pub screen: Screen,
    /// Message of the most recent failed operation, cleared on the next success.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Action {
    Upload(UploadAction),
    Selection(SelectionAction),
    Loading(LoadingAction),
    Results(ResultsAction),
    Navigate(Screen),
    SetError(Option<String>),
    Reset,
}

impl From<UploadAction> for Action {
    fn from(a: UploadAction) -> Self {
        Action::Upload(a)
    }
}

impl From<SelectionAction> for Action {
    fn from(a: SelectionAction) -> Self {
        Action::Selection(a)
    }
}

impl From<LoadingAction> for Action {
    fn from(a: LoadingAction) -> Self {
        Action::Loading(a)
    }
}

impl From<ResultsAction> for Action {
    fn from(a: ResultsAction) -> Self {
        Action::Results(a)
    }
}

/// Root reducer.
///
/// Selecting a new file also drops the previous file's segment images, so a
/// conversion can never mix segments from two documents.
pub fn reduce(state: AppState, action: Action) -> AppState {
    match action {
        Action::Upload(a) => {
            let clears_images = matches!(a, UploadAction::Select(_) | UploadAction::Clear);
            let selection = if clears_images {
                selection::reduce(state.selection, SelectionAction::ClearImages)
            } else {
                state.selection
            };
            AppState {
                upload: upload::reduce(state.upload, a),
                selection,
                ..state
            }
        }
        Action::Selection(a) => AppState {
            selection: selection::reduce(state.selection, a),
            ..state
        },
        Action::Loading(a) => AppState {
            loading: loading::reduce(state.loading, a),
            ..state
        },
        Action::Results(a) => AppState {
            results: results::reduce(state.results, a),
            ..state
        },
        Action::Navigate(screen) => AppState { screen, ..state },
        Action::SetError(last_error) => AppState { last_error, ..state },
        Action::Reset => AppState {
            upload: upload::reduce(state.upload, UploadAction::Clear),
            selection: SelectionState::with_model(state.selection.model_id),
            ..AppState::default()
        },
    }
}

impl AppState {
    /// A fresh state whose model defaults to `model_id`.
    pub fn with_model(model_id: impl Into<String>) -> Self {
        Self {
            selection: SelectionState::with_model(model_id),
            ..Self::default()
        }
    }

    /// Apply an action. Navigation and reset while loading are refused and
    /// leave the state untouched.
    pub fn dispatch(&mut self, action: impl Into<Action>) -> Result<(), MolSnapError> {
        let action = action.into();
        if self.loading.is_loading && matches!(action, Action::Navigate(_) | Action::Reset) {
            return Err(MolSnapError::NavigationBlocked);
        }
        *self = reduce(std::mem::take(self), action);
        Ok(())
    }
}
