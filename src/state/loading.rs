//! Loading container: whether a conversion is in flight.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub is_loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingAction {
    Begin,
    Finish,
}

pub fn reduce(_state: LoadingState, action: LoadingAction) -> LoadingState {
    LoadingState {
        is_loading: action == LoadingAction::Begin,
    }
}
