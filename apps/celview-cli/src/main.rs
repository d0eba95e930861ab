use anyhow::Context;
use celview_app::{App, AppConfig, HeadlessViewer, demo_scene};
use celview_common::{Color, Mat4, Vec2};
use celview_input::InputEvent;
use celview_render::{BufferKind, DeviceRenderer, RecordingDevice};
use celview_scene::{Mesh, Scene, primitives};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "celview-cli", about = "CLI tool for celview")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// List the meshes of a glTF/GLB file
    Inspect {
        file: PathBuf,
    },
    /// Run frames on the recording device and print what was drawn
    Render {
        /// Number of frames to run
        #[arg(short, long, default_value = "3")]
        frames: u32,
        /// glTF/GLB file to render; overrides --primitive
        #[arg(long)]
        file: Option<PathBuf>,
        /// Built-in scene to render when no file is given
        #[arg(short, long, value_enum, default_value = "demo")]
        primitive: Primitive,
        /// Orbit the camera by dragging this many pixels each frame
        #[arg(long, default_value = "0")]
        orbit: f32,
        /// Print every recorded device command
        #[arg(long)]
        journal: bool,
    },
    /// Print a config file, the defaults unless a path is given
    Config {
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Primitive {
    Quad,
    Cube,
    Demo,
}

impl Primitive {
    fn scene(self) -> Scene {
        match self {
            Primitive::Quad => single(primitives::quad(Color::WHITE)),
            Primitive::Cube => single(primitives::white_cube()),
            Primitive::Demo => demo_scene(),
        }
    }
}

fn single(mesh: Mesh) -> Scene {
    let mut scene = Scene::new();
    scene.add(mesh, Mat4::IDENTITY);
    scene
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("celview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", celview_common::crate_info());
            println!("scene: {}", celview_scene::crate_info());
            println!("render: {}", celview_render::crate_info());
            println!("input: {}", celview_input::crate_info());
            println!("assets: {}", celview_assets::crate_info());
            println!("app: {}", celview_app::crate_info());
        }
        Commands::Inspect { file } => {
            let meshes = celview_assets::load_meshes(&file)
                .with_context(|| format!("importing {}", file.display()))?;
            println!("{}: {} mesh(es)", file.display(), meshes.len());
            for imported in &meshes {
                let (min, max) = imported.mesh.bounds();
                println!(
                    "  {}: vertices={}, triangles={}, bounds=[{:.3}, {:.3}, {:.3}]..[{:.3}, {:.3}, {:.3}]",
                    imported.name,
                    imported.mesh.vertex_count(),
                    imported.mesh.triangle_count(),
                    min.x,
                    min.y,
                    min.z,
                    max.x,
                    max.y,
                    max.z
                );
            }
        }
        Commands::Render {
            frames,
            file,
            primitive,
            orbit,
            journal: dump_journal,
        } => {
            let scene = match &file {
                Some(path) => {
                    let model = celview_assets::load_model(path)
                        .with_context(|| format!("importing {}", path.display()))?;
                    let mut scene = Scene::new();
                    scene.add(model, Mat4::IDENTITY);
                    scene
                }
                None => primitive.scene(),
            };

            let config = AppConfig::default();
            let device = RecordingDevice::new();
            let journal = device.journal();
            let renderer = DeviceRenderer::with_device(device)?;
            let mut viewer = HeadlessViewer::new(config.width, config.height);
            let mut app = App::new(config, renderer);
            let camera = app.camera().clone();
            app.setup(scene, camera);

            let report = app.start()?;
            println!(
                "registered {} mesh(es), {} failed",
                report.registered.len(),
                report.failed.len()
            );
            for (mesh, reason) in &report.failed {
                println!("  {mesh}: {reason}");
            }

            let center = Vec2::new(360.0, 240.0);
            for frame in 0..frames {
                if orbit != 0.0 {
                    app.input_mut().push(InputEvent::CursorDrag {
                        start: center,
                        stop: center + Vec2::new(orbit, 0.0),
                    });
                }
                let stats = app.frame(&mut viewer)?;
                let eye = app.camera().position();
                println!(
                    "frame {frame}: draws={}, indices={}, skipped={}, eye=({:.2}, {:.2}, {:.2})",
                    stats.draw_calls, stats.indices, stats.skipped, eye.x, eye.y, eye.z
                );
            }

            drop(app);
            let journal = journal.borrow();
            if dump_journal {
                for command in journal.commands() {
                    println!("  {command:?}");
                }
            }
            println!(
                "device: frames={}, vertex buffers={}/{}, index buffers={}/{}, layouts={}/{}, live={}",
                journal.frames(),
                journal.buffers_released(BufferKind::Vertex),
                journal.buffers_created(BufferKind::Vertex),
                journal.buffers_released(BufferKind::Index),
                journal.buffers_created(BufferKind::Index),
                journal.layouts_released(),
                journal.layouts_created(),
                journal.live().len()
            );
        }
        Commands::Config { path } => {
            let config = match &path {
                Some(path) => AppConfig::load(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => AppConfig::default(),
            };
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}
