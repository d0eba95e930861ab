use anyhow::{Context, Result};
use celview_app::{App, AppConfig, Viewer, demo_scene};
use celview_common::{BackendKind, Mat4, Vec2};
use celview_input::{DragTracker, InputEvent, MouseButton};
use celview_render::{DeviceRenderer, ViewportHandle};
use celview_render_wgpu::{GpuContext, WgpuDevice};
use celview_scene::Scene;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// Wheel pixels that count as one line of zoom.
const PIXELS_PER_LINE: f32 = 40.0;

#[derive(Parser)]
#[command(name = "celview-desktop", about = "View a model in a window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Graphics backend: direct3d, opengl or auto
    #[arg(long)]
    backend: Option<BackendKind>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    title: Option<String>,

    /// glTF/GLB file to show instead of the demo scene
    #[arg(long)]
    model: Option<PathBuf>,
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AppConfig::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(title) = &self.title {
            config.title = title.clone();
        }
        Ok(config)
    }

    fn scene(&self) -> Result<Scene> {
        let Some(path) = &self.model else {
            return Ok(demo_scene());
        };
        let model = celview_assets::load_model(path)
            .with_context(|| format!("importing {}", path.display()))?;
        let mut scene = Scene::new();
        scene.add(model, Mat4::IDENTITY);
        Ok(scene)
    }
}

struct WindowViewer {
    window: Arc<Window>,
}

impl Viewer for WindowViewer {
    fn buffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width.max(1), size.height.max(1))
    }

    fn viewport(&self) -> ViewportHandle {
        ViewportHandle::PRIMARY
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}

struct DesktopApp {
    // Dropped before `context` so device objects go before the instance.
    app: Option<App<DeviceRenderer<WgpuDevice>>>,
    viewer: Option<WindowViewer>,
    context: Arc<GpuContext>,
    config: AppConfig,
    scene: Option<Scene>,
    drag: DragTracker,
    failure: Option<anyhow::Error>,
}

impl DesktopApp {
    fn new(config: AppConfig, scene: Scene) -> Self {
        Self {
            app: None,
            viewer: None,
            context: GpuContext::new(config.backend),
            config,
            scene: Some(scene),
            drag: DragTracker::default(),
            failure: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let size = window.inner_size();

        let mut device = WgpuDevice::new(
            self.context.clone(),
            window.clone(),
            size.width,
            size.height,
        )?;
        device.set_vsync(self.config.enable_vsync);
        let renderer = DeviceRenderer::with_device(device)?;

        let mut app = App::new(self.config.clone(), renderer);
        if let Some(scene) = self.scene.take() {
            let camera = app.camera().clone();
            app.setup(scene, camera);
        }
        let report = app.start()?;
        for (mesh, reason) in &report.failed {
            tracing::warn!(%mesh, %reason, "mesh will not be drawn");
        }

        tracing::info!(
            backend = %self.context.backend(),
            width = size.width,
            height = size.height,
            "window ready"
        );
        self.viewer = Some(WindowViewer { window });
        self.app = Some(app);
        Ok(())
    }
}

impl ApplicationHandler for DesktopApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("startup failed: {e:#}");
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(app), Some(viewer)) = (&mut self.app, &mut self.viewer) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                app.input_mut().push(InputEvent::CloseRequested);
            }
            WindowEvent::Resized(size) => {
                let (width, height) = (size.width.max(1), size.height.max(1));
                if let Some(device) = app.renderer_mut().device_mut() {
                    device.resize(width, height);
                }
                app.input_mut().push(InputEvent::Resized { width, height });
            }
            WindowEvent::MouseInput { button, state, .. } => {
                let button = match button {
                    winit::event::MouseButton::Left => MouseButton::Left,
                    winit::event::MouseButton::Right => MouseButton::Right,
                    winit::event::MouseButton::Middle => MouseButton::Middle,
                    _ => return,
                };
                self.drag
                    .button_changed(button, state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if let Some(drag) = self.drag.cursor_moved(position) {
                    app.input_mut().push(drag);
                }
            }
            WindowEvent::CursorLeft { .. } => self.drag.cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                app.input_mut().push(InputEvent::Zoom { delta });
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = app.frame(viewer) {
                    tracing::error!("frame failed: {e}");
                    self.failure = Some(e.into());
                    event_loop.exit();
                    return;
                }
                if app.should_close() {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = &self.viewer {
            viewer.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = cli.app_config()?;
    let scene = cli.scene()?;
    tracing::info!(title = %config.title, backend = %config.backend, "starting celview");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DesktopApp::new(config, scene);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
