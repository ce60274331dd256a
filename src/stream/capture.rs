//! Capture loop: one camera thread feeding one broadcast task
//!
//! The camera thread owns the capture session and overwrites a single-slot
//! watch channel with each new frame, so a slow broadcast only ever sees the
//! latest frame. The broadcast task runs until its running flag goes false or
//! the camera thread exits.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::Inner;
use crate::camera::FrameSource;

/// Pause after a failed frame grab
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Handle to a running capture loop
pub(super) struct CaptureTask {
    running: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CaptureTask {
    pub(super) fn spawn(inner: Arc<Inner>) -> Self {
        let (running, running_rx) = watch::channel(true);
        let handle = tokio::spawn(broadcast_loop(inner, running_rx));
        Self { running, handle }
    }

    /// The loop exits on its own when the camera fails to open
    pub(super) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait until the camera is released
    pub(super) async fn shutdown(self) {
        let _ = self.running.send(false);
        if let Err(e) = self.handle.await {
            tracing::error!("Capture task failed: {}", e);
        }
    }
}

async fn broadcast_loop(inner: Arc<Inner>, mut running: watch::Receiver<bool>) {
    let (frame_tx, mut frame_rx) = watch::channel::<Option<Bytes>>(None);

    let source = inner.source.clone();
    let producer = match std::thread::Builder::new()
        .name("camera-capture".to_string())
        .spawn(move || capture_thread(source, frame_tx))
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to spawn capture thread: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            changed = running.changed() => {
                if changed.is_err() || !*running.borrow() {
                    break;
                }
            }
            changed = frame_rx.changed() => {
                if changed.is_err() {
                    // Camera thread has exited
                    break;
                }
                let frame = frame_rx.borrow_and_update().clone();
                if let Some(frame) = frame {
                    inner.broadcast(frame);
                }
            }
        }
    }

    // Closing the slot tells the camera thread to finish its current frame and exit
    drop(frame_rx);
    match tokio::task::spawn_blocking(move || producer.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::error!("Capture thread panicked"),
        Err(e) => tracing::error!("Failed to join capture thread: {}", e),
    }
}

fn capture_thread(source: Arc<dyn FrameSource>, frames: watch::Sender<Option<Bytes>>) {
    tracing::info!("Starting capture thread ({})", source.name());

    let mut session = match source.open() {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to start capture: {}", e);
            return;
        }
    };

    loop {
        match session.next_frame() {
            Ok(frame) => {
                if frames.send(Some(frame)).is_err() {
                    break;
                }
            }
            Err(e) => {
                if frames.is_closed() {
                    break;
                }
                tracing::warn!("Failed to capture frame: {}", e);
                std::thread::sleep(CAPTURE_RETRY_DELAY);
            }
        }
    }

    drop(session);
    tracing::info!("Capture thread stopped");
}
