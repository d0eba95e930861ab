use crate::config::AppConfig;
use crate::controller::CameraController;
use crate::error::AppError;
use crate::timer::FrameTimer;
use crate::viewer::Viewer;
use celview_common::Vec3;
use celview_input::InputBus;
use celview_render::{Camera, FrameStats, PrepareReport, Renderer};
use celview_scene::Scene;
use tracing::{debug, info, warn};

/// The frame loop: input, camera, title, then prepare/cull/render.
pub struct App<R: Renderer> {
    config: AppConfig,
    renderer: R,
    scene: Scene,
    camera: Camera,
    controller: CameraController,
    input: InputBus,
    timer: FrameTimer,
    started: bool,
    close_requested: bool,
}

impl<R: Renderer> App<R> {
    pub fn new(config: AppConfig, mut renderer: R) -> Self {
        renderer.set_clear_color(config.background);
        renderer.set_buffer_size(config.width, config.height);
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        camera.set_aspect(config.width, config.height);
        Self {
            config,
            renderer,
            scene: Scene::new(),
            camera,
            controller: CameraController::default(),
            input: InputBus::new(),
            timer: FrameTimer::new(),
            started: false,
            close_requested: false,
        }
    }

    /// Replace the scene and camera. Ignored once the app has started.
    pub fn setup(&mut self, scene: Scene, camera: Camera) {
        if self.started {
            warn!("setup called after start, ignoring");
            return;
        }
        self.scene = scene;
        self.camera = camera;
    }

    /// Register every model of the scene with the renderer.
    pub fn start(&mut self) -> Result<PrepareReport, AppError> {
        let report = self.renderer.set_scene(&self.scene)?;
        self.started = true;
        info!(
            title = %self.config.title,
            models = self.scene.arena().len(),
            instances = self.scene.instance_count(),
            "app started"
        );
        Ok(report)
    }

    /// Consume this frame's input and reset the bus. The drawable size is
    /// read from the viewer every frame.
    pub fn update(&mut self, viewer: &mut impl Viewer) {
        if let Some((width, height)) = self.input.last_resize() {
            debug!(width, height, "viewer resized");
        }
        let (width, height) = viewer.buffer_size();
        self.renderer.set_buffer_size(width, height);
        self.camera.set_aspect(width, height);
        if self.input.close_requested() {
            self.close_requested = true;
        }
        if self.config.default_camera_control_enabled {
            self.controller
                .apply(&mut self.camera, &self.input, viewer.buffer_size());
        }
        if self.config.show_fps_in_title && self.timer.frames() > 0 {
            viewer.set_title(&self.timer.title(&self.config.title));
        }
        self.input.reset();
    }

    /// Prepare, cull and draw the scene into `viewer`'s viewport.
    pub fn render(&mut self, viewer: &impl Viewer) -> Result<FrameStats, AppError> {
        self.timer.begin();
        let result = self.draw(viewer);
        self.timer.end();
        result
    }

    fn draw(&mut self, viewer: &impl Viewer) -> Result<FrameStats, AppError> {
        self.renderer.prepare(&self.scene)?;
        let viewport = viewer.viewport();
        self.renderer
            .update_viewport_transform(viewport, &self.camera);
        let culled = self.renderer.cull(viewport, &self.scene);
        Ok(self.renderer.render(viewport, &culled)?)
    }

    /// One tick: start if needed, update, render.
    pub fn frame(&mut self, viewer: &mut impl Viewer) -> Result<FrameStats, AppError> {
        if !self.started {
            self.start()?;
        }
        self.update(viewer);
        self.render(&*viewer)
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn input_mut(&mut self) -> &mut InputBus {
        &mut self.input
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access. Models added after start are registered lazily
    /// by the next frame's prepare pass.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn controller_mut(&mut self) -> &mut CameraController {
        &mut self.controller
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }
}

impl<R: Renderer> Drop for App<R> {
    fn drop(&mut self) {
        info!("app terminated");
    }
}
