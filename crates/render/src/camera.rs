use glam::{Mat4, Quat, Vec3};

/// Perspective camera described by a position, a facing and an up vector.
///
/// Right-handed; clip-space depth runs from 0 at the near plane to 1 at the far
/// plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z)
    }
}

impl Camera {
    /// A camera at `position` facing `direction`, with +Y as the up hint.
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        let forward = direction.normalize_or(Vec3::NEG_Z);
        Self {
            position,
            forward,
            up: orthogonal_up(forward, Vec3::Y),
            fov_y: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize()
    }

    /// Aspect ratio from a buffer size; zero sides count as one pixel.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Face `target` from the current position.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let dir = target - self.position;
        if dir.length_squared() <= f32::EPSILON {
            return;
        }
        self.forward = dir.normalize();
        self.up = orthogonal_up(self.forward, up);
    }

    /// Orbit the camera position around `center` about `axis`. The facing turns
    /// with it.
    pub fn rotate_position(&mut self, center: Vec3, axis: Vec3, radians: f32) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        let q = Quat::from_axis_angle(axis, radians);
        self.position = center + q * (self.position - center);
        self.forward = (q * self.forward).normalize();
        self.up = orthogonal_up(self.forward, q * self.up);
    }

    /// Move along the camera's own right, up and forward axes.
    pub fn translate(&mut self, right: f32, up: f32, forward: f32) {
        self.position += self.right() * right + self.up * up + self.forward * forward;
    }

    pub fn world_to_view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn view_to_clip(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// World space to clip space, consumed by the renderer every frame.
    pub fn world_to_clip(&self) -> Mat4 {
        self.view_to_clip() * self.world_to_view()
    }
}

/// Gram-Schmidt `up` against `forward`, falling back to another axis when they
/// are parallel.
fn orthogonal_up(forward: Vec3, up: Vec3) -> Vec3 {
    let candidate = up - forward * forward.dot(up);
    candidate
        .try_normalize()
        .unwrap_or_else(|| forward.any_orthonormal_vector())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn corners() -> Vec<Vec3> {
        let mut out = Vec::new();
        for x in [-0.5, 0.5] {
            for y in [-0.5, 0.5] {
                for z in [-0.5, 0.5] {
                    out.push(Vec3::new(x, y, z));
                }
            }
        }
        out
    }

    fn inside_view_volume(p: Vec4) -> bool {
        p.w > 0.0 && p.x.abs() <= p.w && p.y.abs() <= p.w && p.z >= 0.0 && p.z <= p.w
    }

    #[test]
    fn default_camera_is_valid() {
        let cam = Camera::default();
        let m = cam.world_to_clip();
        assert!(!m.is_nan());
        assert_eq!(cam.forward(), Vec3::NEG_Z);
        assert_eq!(cam.up(), Vec3::Y);
    }

    #[test]
    fn unit_cube_corners_land_inside_clip_volume() {
        for distance in [2.0_f32, 10.0, 100.0, 900.0] {
            let mut cam = Camera::new(Vec3::new(0.0, 0.0, distance), Vec3::NEG_Z);
            cam.set_aspect(720, 480);
            let m = cam.world_to_clip();
            let clip: Vec<Vec4> = corners().into_iter().map(|c| m * c.extend(1.0)).collect();
            for p in &clip {
                assert!(inside_view_volume(*p), "{p:?} outside at distance {distance}");
            }
            for i in 0..clip.len() {
                for j in (i + 1)..clip.len() {
                    assert_ne!(clip[i], clip[j]);
                }
            }
        }
    }

    #[test]
    fn points_behind_camera_are_outside() {
        let cam = Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let p = cam.world_to_clip() * Vec4::new(0.0, 0.0, 20.0, 1.0);
        assert!(!inside_view_volume(p));
    }

    #[test]
    fn set_aspect_clamps_zero() {
        let mut cam = Camera::default();
        cam.set_aspect(0, 0);
        assert_eq!(cam.aspect, 1.0);
        cam.set_aspect(720, 480);
        assert!((cam.aspect - 1.5).abs() < 1e-6);
    }

    #[test]
    fn orbit_keeps_distance_to_center() {
        let mut cam = Camera::new(Vec3::new(0.0, 0.0, 8.0), Vec3::NEG_Z);
        cam.rotate_position(Vec3::ZERO, Vec3::Y, std::f32::consts::FRAC_PI_2);
        assert!((cam.position().length() - 8.0).abs() < 1e-4);
        assert!((cam.position() - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-4);
        // still facing the origin
        assert!((cam.forward() - Vec3::NEG_X).length() < 1e-4);
    }

    #[test]
    fn translate_forward_approaches_target() {
        let mut cam = Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        cam.translate(0.0, 0.0, 2.0);
        assert_eq!(cam.position(), Vec3::new(0.0, 0.0, 8.0));
    }

    #[test]
    fn look_at_straight_down_has_valid_up() {
        let mut cam = Camera::new(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Z);
        cam.look_at(Vec3::ZERO, Vec3::Y);
        assert!((cam.forward() - Vec3::NEG_Y).length() < 1e-6);
        assert!(cam.up().dot(cam.forward()).abs() < 1e-6);
        assert!(!cam.world_to_clip().is_nan());
    }
}
