//! Mapping from device-neutral descriptions to wgpu types.

use celview_common::Color;
use celview_render::{CullMode, DeviceError, ElementFormat, FillMode, IndexFormat, RasterizerDesc};

/// Size of one slot in the uniform arena. Constant buffers may not exceed it.
pub const UNIFORM_SLOT: u64 = 256;

pub fn vertex_format(format: ElementFormat) -> Result<wgpu::VertexFormat, DeviceError> {
    match format {
        ElementFormat::Float32x2 => Ok(wgpu::VertexFormat::Float32x2),
        ElementFormat::Float32x3 => Ok(wgpu::VertexFormat::Float32x3),
        ElementFormat::Float32x4 => Ok(wgpu::VertexFormat::Float32x4),
        ElementFormat::Float64x3 | ElementFormat::Float64x4 => Err(DeviceError::LayoutMismatch(
            format!("{format:?} attributes are not supported by this device"),
        )),
    }
}

pub fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

pub fn primitive_state(desc: &RasterizerDesc) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: if desc.front_counter_clockwise {
            wgpu::FrontFace::Ccw
        } else {
            wgpu::FrontFace::Cw
        },
        cull_mode: match desc.cull {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        polygon_mode: match desc.fill {
            FillMode::Solid => wgpu::PolygonMode::Fill,
            FillMode::Wireframe => wgpu::PolygonMode::Line,
        },
        ..Default::default()
    }
}

pub fn clear_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: color.a as f64,
    }
}

/// Round a buffer size up to wgpu's copy alignment.
pub fn copy_aligned(len: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    len.div_ceil(align) * align
}

/// Per-frame staging for constant-buffer snapshots. Each snapshot takes one
/// [`UNIFORM_SLOT`]-sized slot and is addressed by a dynamic offset.
#[derive(Debug, Default)]
pub struct UniformStaging {
    bytes: Vec<u8>,
}

impl UniformStaging {
    /// Append a snapshot and return its dynamic offset.
    pub fn push(&mut self, data: &[u8]) -> Result<u32, DeviceError> {
        if data.len() as u64 > UNIFORM_SLOT {
            return Err(DeviceError::Validation(format!(
                "constant buffer of {} bytes exceeds the {UNIFORM_SLOT} byte slot",
                data.len()
            )));
        }
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(data);
        self.bytes.resize(offset + UNIFORM_SLOT as usize, 0);
        u32::try_from(offset)
            .map_err(|_| DeviceError::Validation("uniform arena offset overflow".into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_offsets_are_slot_aligned() {
        let mut staging = UniformStaging::default();
        assert_eq!(staging.push(&[1; 128]).unwrap(), 0);
        assert_eq!(staging.push(&[2; 48]).unwrap(), 256);
        assert_eq!(staging.len(), 512);
        assert_eq!(staging.as_bytes()[256], 2);
        assert_eq!(staging.as_bytes()[256 + 48], 0);
    }

    #[test]
    fn oversized_snapshot_is_rejected() {
        let mut staging = UniformStaging::default();
        assert!(staging.push(&[0; 300]).is_err());
        assert!(staging.is_empty());
    }

    #[test]
    fn doubles_are_unsupported() {
        assert!(vertex_format(ElementFormat::Float64x3).is_err());
        assert_eq!(
            vertex_format(ElementFormat::Float32x4).unwrap(),
            wgpu::VertexFormat::Float32x4
        );
    }

    #[test]
    fn default_rasterizer_is_solid_ccw_without_culling() {
        let state = primitive_state(&RasterizerDesc::default());
        assert_eq!(state.front_face, wgpu::FrontFace::Ccw);
        assert_eq!(state.cull_mode, None);
        assert_eq!(state.polygon_mode, wgpu::PolygonMode::Fill);
    }

    #[test]
    fn copy_alignment_rounds_up() {
        assert_eq!(copy_aligned(0), 0);
        assert_eq!(copy_aligned(6), 8);
        assert_eq!(copy_aligned(8), 8);
    }
}
