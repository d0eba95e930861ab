//! Stateful graphics device abstraction.
//!
//! The trait mirrors an immediate-context API: resources are created up front,
//! state is bound piecemeal, and `draw_indexed` consumes whatever is bound at
//! that moment. Constant-buffer updates are ordered with draws.

use crate::error::DeviceError;
use crate::layout::{ShaderInput, VertexLayout};
use celview_common::Color;
use std::borrow::Cow;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// A vertex, index, or constant buffer.
    BufferId
);
handle!(
    /// A compiled shader stage.
    ShaderId
);
handle!(
    /// An input layout bound to a vertex shader signature.
    LayoutId
);
handle!(
    /// A rasterizer state object.
    RasterizerId
);

/// Any releasable device object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Buffer(BufferId),
    Shader(ShaderId),
    Layout(LayoutId),
    Rasterizer(RasterizerId),
}

impl From<BufferId> for Resource {
    fn from(id: BufferId) -> Self {
        Resource::Buffer(id)
    }
}

impl From<ShaderId> for Resource {
    fn from(id: ShaderId) -> Self {
        Resource::Shader(id)
    }
}

impl From<LayoutId> for Resource {
    fn from(id: LayoutId) -> Self {
        Resource::Layout(id)
    }
}

impl From<RasterizerId> for Resource {
    fn from(id: RasterizerId) -> Self {
        Resource::Rasterizer(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
}

/// Buffer creation parameters. `contents`, when present, must be exactly
/// `size` bytes long.
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub size: u64,
    pub contents: Option<&'a [u8]>,
}

impl<'a> BufferDesc<'a> {
    /// A buffer initialised from `contents` and sized exactly to it.
    pub fn with_contents(label: &'a str, kind: BufferKind, contents: &'a [u8]) -> Self {
        Self {
            label,
            kind,
            size: contents.len() as u64,
            contents: Some(contents),
        }
    }

    /// An uninitialised buffer of `size` bytes.
    pub fn zeroed(label: &'a str, kind: BufferKind, size: u64) -> Self {
        Self {
            label,
            kind,
            size,
            contents: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerDesc {
    pub fill: FillMode,
    pub cull: CullMode,
    pub front_counter_clockwise: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            fill: FillMode::Solid,
            cull: CullMode::None,
            front_counter_clockwise: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Viewport rectangle in pixels with a 0..1 depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl ViewportRect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A vertex/pixel shader pair in the device's own shading language.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub label: &'static str,
    pub source: Cow<'static, str>,
    pub vertex_entry: &'static str,
    pub pixel_entry: &'static str,
    /// Inputs the vertex entry point reads.
    pub inputs: Vec<ShaderInput>,
}

impl ShaderProgram {
    pub fn entry(&self, stage: ShaderStage) -> &'static str {
        match stage {
            ShaderStage::Vertex => self.vertex_entry,
            ShaderStage::Pixel => self.pixel_entry,
        }
    }
}

/// An immediate-context graphics device.
///
/// Creation calls are fallible and fatal at initialization. Bind calls only
/// record state; validation of what is bound happens at `draw_indexed`.
pub trait GraphicsDevice {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// The fixed shader program this device ships with.
    fn builtin_program(&self) -> ShaderProgram;

    fn compile_shader(
        &mut self,
        program: &ShaderProgram,
        stage: ShaderStage,
    ) -> Result<ShaderId, DeviceError>;

    fn create_rasterizer_state(&mut self, desc: &RasterizerDesc)
    -> Result<RasterizerId, DeviceError>;

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError>;

    /// Create an input layout checked against `vertex_shader`'s declared inputs.
    fn create_input_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_shader: ShaderId,
    ) -> Result<LayoutId, DeviceError>;

    /// Overwrite a buffer's contents. For constant buffers the new contents
    /// apply to draws issued after this call.
    fn update_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError>;

    fn begin_frame(&mut self, clear: Color) -> Result<(), DeviceError>;

    fn set_viewport(&mut self, rect: ViewportRect);

    fn bind_shaders(&mut self, vertex: ShaderId, pixel: ShaderId);

    fn bind_rasterizer_state(&mut self, state: RasterizerId);

    fn bind_input_layout(&mut self, layout: LayoutId);

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferId, stride: u32, offset: u32);

    fn bind_index_buffer(&mut self, buffer: BufferId, format: IndexFormat);

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferId);

    fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), DeviceError>;

    /// Submit and present the frame.
    fn end_frame(&mut self) -> Result<(), DeviceError>;

    /// Drop the open frame without presenting it. No-op outside a frame.
    fn abort_frame(&mut self);

    /// Destroy a device object. Releasing twice is a caller bug; devices log it.
    fn release(&mut self, resource: Resource);
}
