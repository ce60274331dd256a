//! Camera device capture through nokhwa
//!
//! Frames are decoded to RGB and re-encoded as JPEG at the configured
//! quality so every viewer gets a self-contained image.

use bytes::Bytes;
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use super::{encode_jpeg, CameraError, CaptureConfig, CaptureSession, FrameSource};

pub struct NokhwaSource {
    config: CaptureConfig,
}

impl NokhwaSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    fn open_camera(&self) -> Result<Camera, CameraError> {
        let index = CameraIndex::Index(self.config.camera_index);
        let resolution = Resolution::new(self.config.width, self.config.height);

        // Closest match to the configured size first, then whatever the driver offers
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(resolution));
        match Camera::new(index.clone(), requested) {
            Ok(camera) => Ok(camera),
            Err(e) => {
                tracing::warn!(
                    "Failed to open camera at {}x{}: {}",
                    self.config.width,
                    self.config.height,
                    e
                );
                let fallback = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
                Camera::new(index, fallback).map_err(|e| CameraError::Open(e.to_string()))
            }
        }
    }
}

impl FrameSource for NokhwaSource {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CameraError> {
        let mut camera = self.open_camera()?;
        camera
            .open_stream()
            .map_err(|e| CameraError::Open(e.to_string()))?;

        tracing::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        Ok(Box::new(NokhwaSession {
            camera,
            quality: self.config.jpeg_quality,
        }))
    }

    fn name(&self) -> &str {
        "nokhwa"
    }
}

struct NokhwaSession {
    camera: Camera,
    quality: u8,
}

impl CaptureSession for NokhwaSession {
    fn next_frame(&mut self) -> Result<Bytes, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::Capture(e.to_string()))?;
        let resolution = buffer.resolution();
        let rgb = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Capture(e.to_string()))?
            .into_raw();
        let image = RgbImage::from_raw(resolution.width(), resolution.height(), rgb)
            .ok_or_else(|| CameraError::Capture("decoded frame has the wrong size".to_string()))?;
        encode_jpeg(&image, self.quality)
    }
}

impl Drop for NokhwaSession {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {}", e);
        }
        tracing::info!("Camera closed");
    }
}
