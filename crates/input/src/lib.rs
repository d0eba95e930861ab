//! Input events pushed by viewers and consumed once per frame by the app.
//!
//! # Invariants
//! - Viewers only push; the application reads and then calls
//!   [`InputBus::reset`] exactly once per frame.
//! - Event order within a frame is arrival order.

pub mod bus;
pub mod drag;
pub mod event;

pub use bus::InputBus;
pub use drag::{DragTracker, MouseButton};
pub use event::{InputEvent, InputKind};

pub fn crate_info() -> &'static str {
    "celview-input v0.1.0"
}
