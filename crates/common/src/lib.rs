//! Shared value types used across the celview crates.
//!
//! Algebra comes from `glam` and is re-exported here so that every crate agrees
//! on one vector/matrix representation.

mod types;

pub use glam::{Mat4, Vec2, Vec3, Vec4};
pub use types::{BackendKind, Color, Extent};

pub fn crate_info() -> &'static str {
    "celview-common v0.1.0"
}
