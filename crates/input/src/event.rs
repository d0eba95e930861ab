use glam::Vec2;

/// A structured input event.
///
/// Cursor positions are window pixels with the origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// The cursor moved from `start` to `stop` while the drag button was held.
    CursorDrag { start: Vec2, stop: Vec2 },
    /// Scroll; positive values zoom in.
    Zoom { delta: f32 },
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Discriminant of an [`InputEvent`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    CursorDrag,
    Zoom,
    Resized,
    CloseRequested,
}

impl InputEvent {
    pub fn kind(&self) -> InputKind {
        match self {
            InputEvent::CursorDrag { .. } => InputKind::CursorDrag,
            InputEvent::Zoom { .. } => InputKind::Zoom,
            InputEvent::Resized { .. } => InputKind::Resized,
            InputEvent::CloseRequested => InputKind::CloseRequested,
        }
    }
}
