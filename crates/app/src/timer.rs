use std::time::{Duration, Instant};

/// Measures how long the render step of each frame takes.
#[derive(Debug, Default, Clone)]
pub struct FrameTimer {
    started: Option<Instant>,
    last: Duration,
    frames: u64,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn end(&mut self) {
        if let Some(started) = self.started.take() {
            self.record(started.elapsed());
        }
    }

    /// Record a frame duration directly.
    pub fn record(&mut self, duration: Duration) {
        self.last = duration;
        self.frames += 1;
    }

    pub fn last_frame(&self) -> Duration {
        self.last
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame_ms(&self) -> f32 {
        self.last.as_secs_f32() * 1000.0
    }

    /// Frames per second implied by the last frame; zero before any frame.
    pub fn fps(&self) -> f32 {
        let secs = self.last.as_secs_f32();
        if secs > 0.0 { 1.0 / secs } else { 0.0 }
    }

    pub fn title(&self, base: &str) -> String {
        format!(
            "{base} -- frame info: {:.3}ms, {:.1}fps",
            self.last_frame_ms(),
            self.fps()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_from_frame_time() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.fps(), 0.0);
        timer.record(Duration::from_millis(20));
        assert!((timer.fps() - 50.0).abs() < 1e-3);
        assert_eq!(timer.frames(), 1);
    }

    #[test]
    fn title_format() {
        let mut timer = FrameTimer::new();
        timer.record(Duration::from_millis(4));
        assert_eq!(timer.title("demo"), "demo -- frame info: 4.000ms, 250.0fps");
    }

    #[test]
    fn begin_end_measures_something() {
        let mut timer = FrameTimer::new();
        timer.begin();
        timer.end();
        assert_eq!(timer.frames(), 1);
        // end without begin is ignored
        timer.end();
        assert_eq!(timer.frames(), 1);
    }
}
