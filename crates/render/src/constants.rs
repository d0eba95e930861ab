//! Constant-buffer records shared with the shaders. Layouts follow uniform
//! buffer packing: every `vec3` is padded to 16 bytes.

use bytemuck::{Pod, Zeroable};
use celview_common::{Color, Mat4, Vec3};

/// The single directional light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    /// Direction towards the light.
    pub dir: [f32; 3],
    pub _pad: f32,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
}

impl Light {
    pub fn new(dir: Vec3, ambient: Color, diffuse: Color) -> Self {
        Self {
            dir: dir.to_array(),
            _pad: 0.0,
            ambient: ambient.to_array(),
            diffuse: diffuse.to_array(),
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new(
            Vec3::new(0.25, 0.5, 0.0),
            Color::new(0.2, 0.2, 0.2, 1.0),
            Color::new(1.0, 0.9, 0.4, 1.0),
        )
    }
}

/// Bound to the pixel stage, slot 0. Uploaded once per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerFrame {
    pub light: Light,
}

/// Bound to the vertex stage, slot 0. Uploaded before every draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerObject {
    /// World to clip space for this instance.
    pub wvp: [[f32; 4]; 4],
    /// Model to world space, used for normals.
    pub world: [[f32; 4]; 4],
}

impl PerObject {
    pub fn new(world: Mat4, world_to_clip: Mat4) -> Self {
        Self {
            wvp: (world_to_clip * world).to_cols_array_2d(),
            world: world.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_have_uniform_friendly_sizes() {
        assert_eq!(std::mem::size_of::<Light>(), 48);
        assert_eq!(std::mem::size_of::<PerFrame>(), 48);
        assert_eq!(std::mem::size_of::<PerObject>(), 128);
    }

    #[test]
    fn per_object_composes_world_first() {
        let world = Mat4::from_translation(Vec3::X);
        let w2c = Mat4::from_scale(Vec3::splat(2.0));
        let cb = PerObject::new(world, w2c);
        let wvp = Mat4::from_cols_array_2d(&cb.wvp);
        let p = wvp.transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(2.0, 0.0, 0.0));
    }
}
