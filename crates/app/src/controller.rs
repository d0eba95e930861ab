use celview_common::{Vec2, Vec3};
use celview_input::InputBus;
use celview_render::Camera;

/// Orbit-and-zoom camera control around a fixed focus point.
///
/// Dragging across the full width of the viewport turns the camera by
/// `rot_range` radians. Zoom steps are scaled by the distance to the focus:
/// full speed at `ideal_distance`, slowing to zero at `block_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraController {
    pub focus: Vec3,
    pub up: Vec3,
    pub rot_range: f32,
    pub ideal_distance: f32,
    pub block_distance: f32,
    /// Lower bound on the zoom scale when zooming out.
    pub min_zoom_out_scale: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            focus: Vec3::ZERO,
            up: Vec3::Y,
            rot_range: std::f32::consts::PI,
            ideal_distance: 8.0,
            block_distance: 4.0,
            min_zoom_out_scale: 0.1,
        }
    }
}

impl CameraController {
    /// Apply this frame's drags and zooms. Returns whether the camera moved.
    pub fn apply(&self, camera: &mut Camera, input: &InputBus, viewport: (u32, u32)) -> bool {
        let drag: Vec2 = input.cursor_drags().map(|(start, stop)| stop - start).sum();
        let zoom: f32 = input.zooms().sum();
        let orbited = self.orbit(camera, drag, viewport);
        let zoomed = self.zoom(camera, zoom);
        orbited || zoomed
    }

    pub fn orbit(&self, camera: &mut Camera, drag: Vec2, viewport: (u32, u32)) -> bool {
        if drag.length_squared() <= 1e-4 {
            return false;
        }
        let width = viewport.0.max(1) as f32;
        let height = viewport.1.max(1) as f32;
        camera.rotate_position(self.focus, self.up, -drag.x / width * self.rot_range);
        let right = camera.right();
        camera.rotate_position(self.focus, -right, -drag.y / height * self.rot_range);
        camera.look_at(self.focus, self.up);
        true
    }

    pub fn zoom(&self, camera: &mut Camera, amount: f32) -> bool {
        if amount == 0.0 {
            return false;
        }
        let distance = (camera.position() - self.focus).length();
        let mut scale =
            ((distance - self.block_distance) / (self.ideal_distance - self.block_distance)).abs();
        if amount < 0.0 {
            scale = scale.max(self.min_zoom_out_scale);
        }
        camera.translate(0.0, 0.0, amount * scale);
        true
    }
}
