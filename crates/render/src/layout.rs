//! CPU-side vertex layout and its mapping onto shader inputs.
//!
//! Byte offsets are always derived from element sizes, in declaration order.
//! Nothing in the renderer hard-codes an offset.

use crate::error::DeviceError;
use bytemuck::{Pod, Zeroable};
use celview_scene::Vertex;

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFormat {
    Float32x2,
    Float32x3,
    Float32x4,
    Float64x3,
    Float64x4,
}

impl ElementFormat {
    /// Size of one element in bytes.
    pub const fn size(self) -> u32 {
        match self {
            ElementFormat::Float32x2 => 8,
            ElementFormat::Float32x3 => 12,
            ElementFormat::Float32x4 => 16,
            ElementFormat::Float64x3 => 24,
            ElementFormat::Float64x4 => 32,
        }
    }
}

/// One attribute of an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: &'static str,
    pub semantic_index: u32,
    pub format: ElementFormat,
    pub slot: u32,
    pub offset: u32,
}

/// Interleaved per-vertex layout of a single buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    elements: Vec<InputElement>,
    stride: u32,
}

impl VertexLayout {
    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }

    /// Bytes from one vertex to the next.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn element(&self, semantic: &str) -> Option<&InputElement> {
        self.elements
            .iter()
            .find(|e| e.semantic.eq_ignore_ascii_case(semantic))
    }
}

/// Lay out `fields` back to back in slot 0. Each offset is the sum of the
/// sizes of the fields before it.
pub fn derive_layout(fields: &[(&'static str, ElementFormat)]) -> VertexLayout {
    let mut offset = 0;
    let elements = fields
        .iter()
        .map(|&(semantic, format)| {
            let e = InputElement {
                semantic,
                semantic_index: 0,
                format,
                slot: 0,
                offset,
            };
            offset += format.size();
            e
        })
        .collect();
    VertexLayout {
        elements,
        stride: offset,
    }
}

/// A `#[repr(C)]` vertex record that can describe its own layout.
pub trait VertexFormat: Pod {
    /// Fields in memory order.
    const FIELDS: &'static [(&'static str, ElementFormat)];

    fn layout() -> VertexLayout {
        derive_layout(Self::FIELDS)
    }
}

/// The vertex record uploaded to the GPU: position, color, normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub normal: [f32; 3],
}

impl VertexFormat for GpuVertex {
    const FIELDS: &'static [(&'static str, ElementFormat)] = &[
        ("POSITION", ElementFormat::Float32x4),
        ("COLOR", ElementFormat::Float32x4),
        ("NORMAL", ElementFormat::Float32x3),
    ];
}

impl From<&Vertex> for GpuVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: v.position().to_array(),
            color: v.color().to_array(),
            normal: v.normal().to_array(),
        }
    }
}

/// An input the vertex shader declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderInput {
    pub semantic: &'static str,
    pub location: u32,
    pub format: ElementFormat,
}

/// Inputs of the built-in vertex shader; one per [`GpuVertex`] field.
pub fn standard_inputs() -> Vec<ShaderInput> {
    GpuVertex::FIELDS
        .iter()
        .enumerate()
        .map(|(location, &(semantic, format))| ShaderInput {
            semantic,
            location: location as u32,
            format,
        })
        .collect()
}

/// A layout element resolved to a shader location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundAttribute {
    pub location: u32,
    pub format: ElementFormat,
    pub offset: u32,
}

/// Resolve every shader input against the layout by semantic name
/// (case-insensitive) and check that the formats agree. Layout elements the
/// shader does not read are ignored.
pub fn match_signature(
    layout: &VertexLayout,
    inputs: &[ShaderInput],
) -> Result<Vec<BoundAttribute>, DeviceError> {
    inputs
        .iter()
        .map(|input| {
            let element = layout.element(input.semantic).ok_or_else(|| {
                DeviceError::LayoutMismatch(format!(
                    "shader input {} has no matching layout element",
                    input.semantic
                ))
            })?;
            if element.format != input.format {
                return Err(DeviceError::LayoutMismatch(format!(
                    "{} is {:?} in the layout but {:?} in the shader",
                    input.semantic, element.format, input.format
                )));
            }
            Ok(BoundAttribute {
                location: input.location,
                format: element.format,
                offset: element.offset,
            })
        })
        .collect()
}
