//! Application loop tying a scene, a camera, a renderer and a viewer together.
//!
//! # Invariants
//! - All scene models are registered with the renderer before the first frame.
//! - Input is consumed in `update` and the bus is reset once per frame.
//! - The camera is the only thing input mutates; the scene is read-only.

mod app;
mod config;
mod controller;
mod demo;
mod error;
mod timer;
mod viewer;

pub use app::App;
pub use config::AppConfig;
pub use controller::CameraController;
pub use demo::demo_scene;
pub use error::AppError;
pub use timer::FrameTimer;
pub use viewer::{HeadlessViewer, Viewer};

pub fn crate_info() -> &'static str {
    "celview-app v0.1.0"
}
