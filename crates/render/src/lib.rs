//! Renderer core: the graphics device abstraction and a renderer that drives it.
//!
//! # Invariants
//! - The renderer never mutates the scene; GPU state lives in a side table
//!   keyed by [`MeshKey`].
//! - Every device object the renderer acquires is released exactly once, in
//!   reverse order of acquisition.
//! - Each draw binds vertex buffer, index buffer, input layout, per-object
//!   constants, shaders and rasterizer state before `draw_indexed`.
//! - Draw order is scene insertion order.
//!
//! [`RecordingDevice`] is a headless device that journals every call. Real
//! backends live in `celview-render-wgpu`.

pub mod camera;
pub mod constants;
pub mod device;
mod error;
pub mod layout;
pub mod recording;
mod renderer;
mod viewport;

pub use camera::Camera;
pub use constants::{Light, PerFrame, PerObject};
pub use device::{
    BufferDesc, BufferId, BufferKind, CullMode, FillMode, GraphicsDevice, IndexFormat, LayoutId,
    RasterizerDesc, RasterizerId, Resource, ShaderId, ShaderProgram, ShaderStage, ViewportRect,
};
pub use error::{DeviceError, RenderError};
pub use layout::{ElementFormat, GpuVertex, ShaderInput, VertexFormat, VertexLayout};
pub use recording::{Journal, RecordingDevice};
pub use renderer::{DeviceRenderer, Renderer, RendererState};
pub use viewport::{
    CullResult, DrawItem, FrameStats, MeshKey, PrepareReport, ViewportHandle, collect_draw_items,
};

pub fn crate_info() -> &'static str {
    "celview-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
