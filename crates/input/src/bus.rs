use crate::event::{InputEvent, InputKind};
use glam::Vec2;

/// Per-frame queue of input events.
#[derive(Debug, Default, Clone)]
pub struct InputBus {
    events: Vec<InputEvent>,
}

impl InputBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        tracing::trace!(?event, "input");
        self.events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.events.iter()
    }

    /// Events of one kind, in arrival order.
    pub fn of_kind(&self, kind: InputKind) -> impl Iterator<Item = &InputEvent> {
        self.events.iter().filter(move |e| e.kind() == kind)
    }

    /// `(start, stop)` of every drag this frame.
    pub fn cursor_drags(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            InputEvent::CursorDrag { start, stop } => Some((start, stop)),
            _ => None,
        })
    }

    pub fn zooms(&self) -> impl Iterator<Item = f32> + '_ {
        self.events.iter().filter_map(|e| match *e {
            InputEvent::Zoom { delta } => Some(delta),
            _ => None,
        })
    }

    /// The most recent resize this frame, if any.
    pub fn last_resize(&self) -> Option<(u32, u32)> {
        self.events.iter().rev().find_map(|e| match *e {
            InputEvent::Resized { width, height } => Some((width, height)),
            _ => None,
        })
    }

    pub fn close_requested(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, InputEvent::CloseRequested))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all events. Called once at the end of every frame.
    pub fn reset(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(x0: f32, x1: f32) -> InputEvent {
        InputEvent::CursorDrag {
            start: Vec2::new(x0, 0.0),
            stop: Vec2::new(x1, 0.0),
        }
    }

    #[test]
    fn filters_by_kind_in_arrival_order() {
        let mut bus = InputBus::new();
        bus.push(drag(0.0, 1.0));
        bus.push(InputEvent::Zoom { delta: 1.0 });
        bus.push(drag(1.0, 3.0));
        let drags: Vec<_> = bus.cursor_drags().map(|(a, b)| b.x - a.x).collect();
        assert_eq!(drags, vec![1.0, 2.0]);
        assert_eq!(bus.of_kind(InputKind::Zoom).count(), 1);
        assert_eq!(bus.len(), 3);
    }

    #[test]
    fn last_resize_wins() {
        let mut bus = InputBus::new();
        bus.push(InputEvent::Resized {
            width: 100,
            height: 50,
        });
        bus.push(InputEvent::Resized {
            width: 720,
            height: 480,
        });
        assert_eq!(bus.last_resize(), Some((720, 480)));
    }

    #[test]
    fn reset_clears_everything() {
        let mut bus = InputBus::new();
        bus.push(InputEvent::CloseRequested);
        assert!(bus.close_requested());
        bus.reset();
        assert!(bus.is_empty());
        assert!(!bus.close_requested());
    }
}
