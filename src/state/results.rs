//! Results container. Every update replaces the whole table.

use crate::aggregate::ConversionResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsState {
    pub results: Vec<ConversionResult>,
}

#[derive(Debug, Clone)]
pub enum ResultsAction {
    Replace(Vec<ConversionResult>),
    Clear,
}

pub fn reduce(_state: ResultsState, action: ResultsAction) -> ResultsState {
    match action {
        ResultsAction::Replace(results) => ResultsState { results },
        ResultsAction::Clear => ResultsState::default(),
    }
}
