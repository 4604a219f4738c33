//! PDF preview widget state: page, zoom and rotation.
//!
//! Rendering is someone else's job; this is the state a preview keeps and
//! the transitions its buttons and key bindings trigger. Page navigation is
//! ignored until the document has reported its page count.

/// Zoom factor applied per zoom step.
pub const ZOOM_STEP: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub num_pages: Option<usize>,
    pub page: usize,
    pub scale: f64,
    pub initial_page: usize,
    pub initial_scale: f64,
    /// Degrees clockwise, always in `0..360`.
    pub rotation: u16,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(1, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerAction {
    /// A different file was handed to the viewer.
    Load,
    LoadSucceeded { num_pages: usize },
    LoadFailed(String),
    GoTo(f64),
    Next,
    Prev,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    RotateLeft,
    RotateRight,
}

impl ViewerAction {
    /// Key binding: arrows page, `+`/`=` and `-` zoom.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(ViewerAction::Prev),
            "ArrowRight" => Some(ViewerAction::Next),
            "+" | "=" => Some(ViewerAction::ZoomIn),
            "-" => Some(ViewerAction::ZoomOut),
            _ => None,
        }
    }
}

fn round_hundredth(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl ViewerState {
    pub fn new(initial_page: usize, initial_scale: f64) -> Self {
        Self {
            num_pages: None,
            page: initial_page.max(1),
            scale: initial_scale,
            initial_page: initial_page.max(1),
            initial_scale,
            rotation: 0,
            loading: false,
            error: None,
        }
    }

    fn go_to(mut self, target: f64) -> Self {
        if let Some(n) = self.num_pages.filter(|n| *n > 0) {
            let p = if target.is_finite() { target.floor() } else { 1.0 };
            self.page = p.clamp(1.0, n as f64) as usize;
        }
        self
    }

    pub fn reduce(self, action: ViewerAction) -> Self {
        match action {
            ViewerAction::Load => Self {
                loading: true,
                ..Self::new(self.initial_page, self.initial_scale)
            },
            ViewerAction::LoadSucceeded { num_pages } => {
                let page = self.page.clamp(1, num_pages.max(1));
                Self {
                    num_pages: Some(num_pages),
                    page,
                    loading: false,
                    error: None,
                    ..self
                }
            }
            ViewerAction::LoadFailed(message) => Self {
                loading: false,
                error: Some(message),
                ..self
            },
            ViewerAction::GoTo(target) => self.go_to(target),
            ViewerAction::Next => {
                let target = self.page as f64 + 1.0;
                self.go_to(target)
            }
            ViewerAction::Prev => {
                let target = self.page as f64 - 1.0;
                self.go_to(target)
            }
            ViewerAction::ZoomIn => Self {
                scale: round_hundredth(self.scale * ZOOM_STEP),
                ..self
            },
            ViewerAction::ZoomOut => Self {
                scale: round_hundredth(self.scale / ZOOM_STEP),
                ..self
            },
            ViewerAction::ResetZoom => Self {
                scale: self.initial_scale,
                ..self
            },
            ViewerAction::RotateLeft => Self {
                rotation: (self.rotation + 270) % 360,
                ..self
            },
            ViewerAction::RotateRight => Self {
                rotation: (self.rotation + 90) % 360,
                ..self
            },
        }
    }
}
