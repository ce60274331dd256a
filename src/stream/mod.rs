//! Camera stream fan-out
//!
//! A single capture loop feeds every connected viewer. Viewers register in a
//! subscriber set and get frames through their own small queue; the loop is
//! started when the first viewer arrives (or on request) and stopped when the
//! last one leaves.

mod capture;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::camera::FrameSource;
use crate::settings::RigSettings;
use crate::telemetry::{StreamMetrics, StreamStats};
use capture::CaptureTask;

/// Stream behaviour knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Frames queued per subscriber before new ones are skipped
    pub queue_depth: usize,
    /// Start capture when the subscriber set becomes non-empty
    pub autostart: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            queue_depth: 2,
            autostart: true,
        }
    }
}

impl From<&RigSettings> for StreamOptions {
    fn from(settings: &RigSettings) -> Self {
        Self {
            queue_depth: settings.subscriber_queue.max(1),
            autostart: settings.autostart_on_subscribe,
        }
    }
}

/// A registered viewer
pub struct Subscription {
    pub id: Uuid,
    pub frames: mpsc::Receiver<Bytes>,
}

struct Inner {
    source: Arc<dyn FrameSource>,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Bytes>>>,
    capture: tokio::sync::Mutex<Option<CaptureTask>>,
    metrics: StreamMetrics,
    options: StreamOptions,
}

impl Inner {
    /// Offer a frame to every subscriber; a full or closed queue only skips that subscriber
    fn broadcast(&self, frame: Bytes) {
        let mut delivered = 0;
        let mut failed = 0;
        {
            let subscribers = self.subscribers.lock();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        failed += 1;
                        tracing::trace!(subscriber = %id, "Frame not delivered: {}", e);
                    }
                }
            }
        }
        self.metrics.record_frame(delivered, failed);
    }
}

/// Shared handle to the capture loop and its subscribers
#[derive(Clone)]
pub struct StreamController {
    inner: Arc<Inner>,
}

impl StreamController {
    pub fn new(source: Arc<dyn FrameSource>, options: StreamOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                subscribers: Mutex::new(HashMap::new()),
                capture: tokio::sync::Mutex::new(None),
                metrics: StreamMetrics::new(),
                options,
            }),
        }
    }

    /// Start the capture loop. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut capture = self.inner.capture.lock().await;
        if capture.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        // Reap a loop that ended on its own (camera failed to open)
        if let Some(finished) = capture.take() {
            finished.shutdown().await;
        }

        *capture = Some(CaptureTask::spawn(self.inner.clone()));
        self.inner.metrics.record_session_start();
        tracing::info!(source = self.inner.source.name(), "Stream started");
        true
    }

    /// Stop the capture loop and wait for the camera to be released.
    /// Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let mut capture = self.inner.capture.lock().await;
        self.shutdown_locked(&mut capture).await
    }

    async fn shutdown_locked(&self, capture: &mut Option<CaptureTask>) -> bool {
        match capture.take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.shutdown().await;
                tracing::info!("Stream stopped");
                was_running
            }
            None => false,
        }
    }

    /// Stop only if nobody subscribed in the meantime
    async fn stop_if_idle(&self) {
        let mut capture = self.inner.capture.lock().await;
        if self.subscriber_count() == 0 {
            self.shutdown_locked(&mut capture).await;
        }
    }

    /// Whether a capture loop is currently running
    pub async fn is_active(&self) -> bool {
        self.inner
            .capture
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Register a viewer. Starts capture for the first one when autostart is on.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.options.queue_depth);
        let id = Uuid::new_v4();

        let first = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.insert(id, tx);
            subscribers.len() == 1
        };
        tracing::debug!(subscriber = %id, "Subscriber added");

        if first && self.inner.options.autostart {
            self.start().await;
        }

        Subscription { id, frames: rx }
    }

    /// Remove a viewer. Stops capture when it was the last one.
    pub async fn unsubscribe(&self, id: Uuid) {
        let now_empty = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.remove(&id).is_some() && subscribers.is_empty()
        };
        tracing::debug!(subscriber = %id, "Subscriber removed");

        if now_empty {
            tracing::info!("Last subscriber left");
            self.stop_if_idle().await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn stats(&self) -> StreamStats {
        self.inner.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraError, CaptureSession};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    /// Numbered frames every few milliseconds; counts opened and closed sessions
    #[derive(Default)]
    struct CountingSource {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct CountingSession {
        next: u64,
        closed: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn open(&self) -> Result<Box<dyn CaptureSession>, CameraError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession {
                next: 0,
                closed: self.closed.clone(),
            }))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    impl CaptureSession for CountingSession {
        fn next_frame(&mut self) -> Result<Bytes, CameraError> {
            std::thread::sleep(Duration::from_millis(5));
            self.next += 1;
            Ok(Bytes::from(format!("frame-{}", self.next)))
        }
    }

    impl Drop for CountingSession {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct BrokenSource;

    impl FrameSource for BrokenSource {
        fn open(&self) -> Result<Box<dyn CaptureSession>, CameraError> {
            Err(CameraError::Open("no such device".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn controller(options: StreamOptions) -> (StreamController, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let source = CountingSource::default();
        let opened = source.opened.clone();
        let closed = source.closed.clone();
        (StreamController::new(Arc::new(source), options), opened, closed)
    }

    async fn next_frame(subscription: &mut Subscription) -> Bytes {
        timeout(Duration::from_secs(2), subscription.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("subscriber queue closed")
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let (stream, opened, closed) = controller(StreamOptions::default());

        assert!(stream.start().await);
        assert!(!stream.start().await);
        assert!(stream.is_active().await);

        assert!(stream.stop().await);
        assert!(!stream.stop().await);
        assert!(!stream.is_active().await);

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(stream.stats().sessions_started, 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_frames() {
        let (stream, _, _) = controller(StreamOptions::default());
        let mut subscription = stream.subscribe().await;
        assert!(stream.is_active().await);

        let frame = next_frame(&mut subscription).await;
        assert!(frame.starts_with(b"frame-"));

        let later = next_frame(&mut subscription).await;
        assert_ne!(frame, later);

        stream.unsubscribe(subscription.id).await;
    }

    #[tokio::test]
    async fn test_last_unsubscribe_stops_capture() {
        let (stream, _, closed) = controller(StreamOptions::default());
        let first = stream.subscribe().await;
        let second = stream.subscribe().await;
        assert_eq!(stream.subscriber_count(), 2);

        stream.unsubscribe(first.id).await;
        assert!(stream.is_active().await);
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        stream.unsubscribe(second.id).await;
        assert!(!stream.is_active().await);
        assert_eq!(stream.subscriber_count(), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_unsubscribe_is_ignored() {
        let (stream, _, _) = controller(StreamOptions::default());
        assert!(stream.start().await);

        stream.unsubscribe(Uuid::new_v4()).await;
        assert!(stream.is_active().await);
        stream.stop().await;
    }

    #[tokio::test]
    async fn test_failed_send_does_not_abort_broadcast() {
        let (stream, _, _) = controller(StreamOptions {
            queue_depth: 1,
            autostart: true,
        });

        // A viewer whose queue is gone but which is still registered
        let dead = stream.subscribe().await;
        drop(dead.frames);
        let mut alive = stream.subscribe().await;

        for _ in 0..3 {
            next_frame(&mut alive).await;
        }

        let stats = stream.stats();
        assert!(stats.failed_deliveries > 0);
        assert!(stats.frames_delivered >= 3);

        stream.unsubscribe(dead.id).await;
        stream.unsubscribe(alive.id).await;
    }

    #[tokio::test]
    async fn test_autostart_disabled_waits_for_start() {
        let (stream, opened, _) = controller(StreamOptions {
            queue_depth: 2,
            autostart: false,
        });

        let mut subscription = stream.subscribe().await;
        assert!(!stream.is_active().await);
        assert_eq!(opened.load(Ordering::SeqCst), 0);

        assert!(stream.start().await);
        next_frame(&mut subscription).await;

        stream.unsubscribe(subscription.id).await;
        assert!(!stream.is_active().await);
    }

    #[tokio::test]
    async fn test_stopped_stream_can_restart() {
        let (stream, opened, closed) = controller(StreamOptions::default());
        let mut subscription = stream.subscribe().await;
        next_frame(&mut subscription).await;

        stream.stop().await;
        // Drain anything queued before the stop
        while subscription.frames.try_recv().is_ok() {}

        assert!(stream.start().await);
        next_frame(&mut subscription).await;
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        stream.unsubscribe(subscription.id).await;
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_open_failure_ends_capture() {
        let stream = StreamController::new(Arc::new(BrokenSource), StreamOptions::default());
        assert!(stream.start().await);

        timeout(Duration::from_secs(2), async {
            while stream.is_active().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("capture loop should end when the camera cannot open");

        // A later start tries again
        assert!(stream.start().await);
        stream.stop().await;
    }
}
