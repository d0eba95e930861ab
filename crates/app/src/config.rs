use crate::error::AppError;
use celview_common::{BackendKind, Color};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Append frame time and FPS to the window title.
    pub show_fps_in_title: bool,
    pub enable_vsync: bool,
    pub background: Color,
    /// Orbit with the left mouse button, zoom with the wheel.
    pub default_camera_control_enabled: bool,
    pub backend: BackendKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "celview".into(),
            width: 720,
            height: 480,
            show_fps_in_title: true,
            enable_vsync: false,
            background: Color::AYANAMI_BLUE,
            default_camera_control_enabled: true,
            backend: BackendKind::Auto,
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, AppError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
