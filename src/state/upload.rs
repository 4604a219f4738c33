//! Upload container: the accepted file and its parse preview.

use crate::intake::UploadSelection;
use crate::parse::ParsePreview;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub selection: Option<UploadSelection>,
    pub preview: ParsePreview,
    /// Bumped whenever the file is replaced or cleared. Work started against
    /// one generation must not land in another.
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub enum UploadAction {
    /// Replace the current file. The preview keeps its range and takes the
    /// new file's type.
    Select(UploadSelection),
    /// Merge a partial preview update; `None` fields are left alone.
    UpdatePreview {
        start_page: Option<usize>,
        end_page: Option<usize>,
    },
    Clear,
}

pub fn reduce(state: UploadState, action: UploadAction) -> UploadState {
    match action {
        UploadAction::Select(selection) => UploadState {
            preview: ParsePreview {
                file_type: selection.mime_type.clone(),
                ..state.preview
            },
            selection: Some(selection),
            generation: state.generation.wrapping_add(1),
        },
        UploadAction::UpdatePreview {
            start_page,
            end_page,
        } => UploadState {
            preview: ParsePreview {
                start_page: start_page.unwrap_or(state.preview.start_page),
                end_page: end_page.unwrap_or(state.preview.end_page),
                ..state.preview
            },
            ..state
        },
        UploadAction::Clear => UploadState {
            generation: state.generation.wrapping_add(1),
            ..UploadState::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str) -> UploadSelection {
        UploadSelection {
            file_name: name.into(),
            mime_type: mime.into(),
            size_bytes: 3,
            page_count: None,
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn select_replaces_wholesale() {
        let s = reduce(UploadState::default(), UploadAction::Select(file("a.png", "image/png")));
        let s = reduce(s, UploadAction::Select(file("b.pdf", "application/pdf")));
        let sel = s.selection.as_ref().unwrap();
        assert_eq!(sel.file_name, "b.pdf");
        assert_eq!(s.preview.file_type, "application/pdf");
    }

    #[test]
    fn preview_update_is_partial() {
        let s = reduce(
            UploadState::default(),
            UploadAction::UpdatePreview {
                start_page: None,
                end_page: Some(5),
            },
        );
        assert_eq!((s.preview.start_page, s.preview.end_page), (1, 5));
        let s = reduce(
            s,
            UploadAction::UpdatePreview {
                start_page: Some(3),
                end_page: None,
            },
        );
        assert_eq!((s.preview.start_page, s.preview.end_page), (3, 5));
    }

    #[test]
    fn clear_resets() {
        let s = reduce(UploadState::default(), UploadAction::Select(file("a.png", "image/png")));
        let s = reduce(s, UploadAction::Clear);
        assert!(s.selection.is_none());
        assert_eq!(s.preview, ParsePreview::default());
    }

    #[test]
    fn generation_moves_on_select_and_clear_only() {
        let s = reduce(UploadState::default(), UploadAction::Select(file("a.pdf", "application/pdf")));
        assert_eq!(s.generation, 1);
        let s = reduce(
            s,
            UploadAction::UpdatePreview {
                start_page: Some(2),
                end_page: None,
            },
        );
        assert_eq!(s.generation, 1);
        let s = reduce(s, UploadAction::Select(file("a.pdf", "application/pdf")));
        assert_eq!(s.generation, 2);
        assert_eq!(reduce(s, UploadAction::Clear).generation, 3);
    }
}
