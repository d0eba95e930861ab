use crate::event::InputEvent;
use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Turns button state and raw cursor positions into
/// [`InputEvent::CursorDrag`] segments.
#[derive(Debug, Clone)]
pub struct DragTracker {
    button: MouseButton,
    held: bool,
    cursor: Option<Vec2>,
}

impl Default for DragTracker {
    fn default() -> Self {
        Self::new(MouseButton::Left)
    }
}

impl DragTracker {
    pub fn new(button: MouseButton) -> Self {
        Self {
            button,
            held: false,
            cursor: None,
        }
    }

    pub fn button_changed(&mut self, button: MouseButton, pressed: bool) {
        if button == self.button {
            self.held = pressed;
        }
    }

    /// Feed a cursor position; returns a drag segment when the button is held
    /// and the position is known from a previous move.
    pub fn cursor_moved(&mut self, position: Vec2) -> Option<InputEvent> {
        let previous = self.cursor.replace(position);
        match previous {
            Some(start) if self.held && start != position => Some(InputEvent::CursorDrag {
                start,
                stop: position,
            }),
            _ => None,
        }
    }

    /// Forget the cursor, e.g. when it leaves the window.
    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.held
    }
}
