//! Synthetic frame source
//!
//! Renders a diagonal gradient that scrolls one step per frame, paced at the
//! configured frame rate. Useful on machines without a camera.

use std::time::{Duration, Instant};

use bytes::Bytes;
use image::{Rgb, RgbImage};

use super::{encode_jpeg, CameraError, CaptureConfig, CaptureSession, FrameSource};

pub struct TestPatternSource {
    config: CaptureConfig,
}

impl TestPatternSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl FrameSource for TestPatternSource {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CameraError> {
        tracing::info!(
            "Test pattern started ({}x{} @ {} fps)",
            self.config.width,
            self.config.height,
            self.config.fps
        );
        Ok(Box::new(TestPatternSession {
            config: self.config,
            frame_interval: Duration::from_secs_f64(1.0 / self.config.fps.max(1) as f64),
            next_frame_at: Instant::now(),
            frame_number: 0,
        }))
    }

    fn name(&self) -> &str {
        "test-pattern"
    }
}

struct TestPatternSession {
    config: CaptureConfig,
    frame_interval: Duration,
    next_frame_at: Instant,
    frame_number: u64,
}

impl TestPatternSession {
    fn render(&self) -> RgbImage {
        let shift = (self.frame_number.wrapping_mul(4) % 256) as u32;
        let (width, height) = (self.config.width.max(1), self.config.height.max(1));
        RgbImage::from_fn(width, height, |x, y| {
            let r = ((x * 255 / width + shift) % 256) as u8;
            let g = ((y * 255 / height + shift) % 256) as u8;
            let b = ((x / 2 + y / 2 + shift) % 256) as u8;
            Rgb([r, g, b])
        })
    }
}

impl CaptureSession for TestPatternSession {
    fn next_frame(&mut self) -> Result<Bytes, CameraError> {
        let now = Instant::now();
        if self.next_frame_at > now {
            std::thread::sleep(self.next_frame_at - now);
        }
        // Resync if more than a frame behind
        self.next_frame_at = (self.next_frame_at + self.frame_interval).max(Instant::now());

        let image = self.render();
        self.frame_number = self.frame_number.wrapping_add(1);
        encode_jpeg(&image, self.config.jpeg_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CaptureConfig {
        CaptureConfig {
            camera_index: 0,
            width: 64,
            height: 48,
            jpeg_quality: 50,
            fps: 100,
        }
    }

    #[test]
    fn test_frames_are_jpeg() {
        let source = TestPatternSource::new(config());
        let mut session = source.open().unwrap();

        let frame = session.next_frame().unwrap();
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_frames_change_over_time() {
        let source = TestPatternSource::new(config());
        let mut session = source.open().unwrap();

        let first = session.next_frame().unwrap();
        let second = session.next_frame().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_frame_pacing() {
        let source = TestPatternSource::new(config());
        let mut session = source.open().unwrap();

        let began = Instant::now();
        for _ in 0..5 {
            session.next_frame().unwrap();
        }
        // First frame is immediate, the next four wait 10 ms each
        assert!(began.elapsed() >= Duration::from_millis(35));
    }
}
