//! Stream counters and frame rate
//!
//! Updated by the capture task, read by the status endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Window used for the broadcast frame rate
const FPS_WINDOW: Duration = Duration::from_secs(2);

/// Counters for the capture-and-broadcast loop
#[derive(Debug, Default)]
pub struct StreamMetrics {
    frames_captured: AtomicU64,
    frames_delivered: AtomicU64,
    failed_deliveries: AtomicU64,
    sessions_started: AtomicU64,
    frame_times: Mutex<VecDeque<Instant>>,
}

/// Point-in-time copy of [`StreamMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StreamStats {
    /// Frames taken from the camera
    pub frames_captured: u64,
    /// Per-subscriber frame deliveries
    pub frames_delivered: u64,
    /// Deliveries skipped because a subscriber queue was full or closed
    pub failed_deliveries: u64,
    /// Times the capture loop has been started
    pub sessions_started: u64,
    /// Frames broadcast per second over the last two seconds
    pub fps: f64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_start(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one frame pulled from the camera and the outcome of its fan-out
    pub fn record_frame(&self, delivered: u64, failed: u64) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered.fetch_add(delivered, Ordering::Relaxed);
        self.failed_deliveries.fetch_add(failed, Ordering::Relaxed);

        let now = Instant::now();
        let mut times = self.frame_times.lock();
        times.push_back(now);
        while times
            .front()
            .is_some_and(|t| now.duration_since(*t) > FPS_WINDOW)
        {
            times.pop_front();
        }
    }

    fn fps(&self) -> f64 {
        let times = self.frame_times.lock();
        let (Some(first), Some(last)) = (times.front(), times.back()) else {
            return 0.0;
        };
        // Stale once the stream stops
        if last.elapsed() > FPS_WINDOW {
            return 0.0;
        }
        let span = last.duration_since(*first).as_secs_f64();
        if times.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (times.len() - 1) as f64 / span
    }

    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            fps: self.fps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = StreamMetrics::new();
        metrics.record_session_start();
        metrics.record_frame(3, 0);
        metrics.record_frame(2, 1);

        let stats = metrics.snapshot();
        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_delivered, 5);
        assert_eq!(stats.failed_deliveries, 1);
    }

    #[test]
    fn test_fps_needs_two_frames() {
        let metrics = StreamMetrics::new();
        assert_eq!(metrics.snapshot().fps, 0.0);
        metrics.record_frame(1, 0);
        assert_eq!(metrics.snapshot().fps, 0.0);
    }

    #[test]
    fn test_fps_estimate() {
        let metrics = StreamMetrics::new();
        for _ in 0..6 {
            metrics.record_frame(1, 0);
            std::thread::sleep(Duration::from_millis(20));
        }
        let fps = metrics.snapshot().fps;
        // Five intervals of at least 20 ms
        assert!(fps > 0.0 && fps <= 50.0, "fps = {}", fps);
    }
}
