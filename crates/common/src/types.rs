use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Linear RGBA color with `f32` channels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    /// Default viewer background.
    pub const AYANAMI_BLUE: Color = Color::rgb(0.18, 0.42, 0.62);
    pub const ASUKA_RED: Color = Color::rgb(0.89, 0.20, 0.17);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

impl From<Color> for Vec4 {
    fn from(c: Color) -> Self {
        Vec4::new(c.r, c.g, c.b, c.a)
    }
}

/// A drawable surface size in pixels. Never smaller than 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    width: u32,
    height: u32,
}

impl Extent {
    /// Build an extent, clamping each side to at least one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Which native graphics API a window renders through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Direct3D,
    #[serde(alias = "gl")]
    OpenGl,
    /// Whatever the platform prefers.
    #[default]
    Auto,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BackendKind::Direct3D => "direct3d",
            BackendKind::OpenGl => "opengl",
            BackendKind::Auto => "auto",
        })
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct3d" | "d3d" | "dx12" => Ok(BackendKind::Direct3D),
            "opengl" | "gl" => Ok(BackendKind::OpenGl),
            "auto" => Ok(BackendKind::Auto),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_clamps_to_one_pixel() {
        let e = Extent::new(0, 0);
        assert_eq!((e.width(), e.height()), (1, 1));
        let e = Extent::new(0, 480);
        assert_eq!((e.width(), e.height()), (1, 480));
    }

    #[test]
    fn extent_aspect() {
        let e = Extent::new(720, 480);
        assert!((e.aspect() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn color_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Color>(), 16);
        assert_eq!(Color::WHITE.to_array(), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(Color::default(), Color::WHITE);
    }

    #[test]
    fn backend_names_parse_both_ways() {
        for kind in [BackendKind::Direct3D, BackendKind::OpenGl, BackendKind::Auto] {
            assert_eq!(kind.to_string().parse::<BackendKind>(), Ok(kind));
        }
        assert_eq!("GL".parse::<BackendKind>(), Ok(BackendKind::OpenGl));
        assert!("vulkan9".parse::<BackendKind>().is_err());
    }
}
