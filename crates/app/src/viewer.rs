use celview_render::ViewportHandle;

/// A window (or stand-in) the application renders into.
///
/// Viewers push input into the application's
/// [`InputBus`](celview_input::InputBus); they hold no reference back to it.
pub trait Viewer {
    /// Current drawable size in pixels.
    fn buffer_size(&self) -> (u32, u32);

    fn viewport(&self) -> ViewportHandle;

    fn set_title(&mut self, title: &str);
}

/// A viewer with no window. Records titles so tests can inspect them.
#[derive(Debug, Clone)]
pub struct HeadlessViewer {
    width: u32,
    height: u32,
    title: String,
}

impl HeadlessViewer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            title: String::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl Viewer for HeadlessViewer {
    fn buffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn viewport(&self) -> ViewportHandle {
        ViewportHandle::PRIMARY
    }

    fn set_title(&mut self, title: &str) {
        self.title.clear();
        self.title.push_str(title);
    }
}
