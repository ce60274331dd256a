//! Camera capture module
//!
//! A [`FrameSource`] opens a [`CaptureSession`] on the capture thread; the
//! session hands out JPEG-encoded frames until it is dropped, which stops
//! recording and releases the device.

#[cfg(feature = "camera")]
pub mod device;
pub mod test_pattern;

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::settings::RigSettings;

pub use test_pattern::TestPatternSource;

/// Camera-related errors
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to open camera: {0}")]
    Open(String),
    #[error("failed to capture frame: {0}")]
    Capture(String),
    #[error("failed to encode JPEG: {0}")]
    Encode(#[from] image::ImageError),
    #[error("camera backend '{0}' is not compiled into this build")]
    BackendUnavailable(&'static str),
}

/// Which implementation produces frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackend {
    /// V4L2 camera through nokhwa
    #[default]
    Nokhwa,
    /// Synthetic moving gradient
    TestPattern,
}

impl CameraBackend {
    pub fn name(&self) -> &'static str {
        match self {
            CameraBackend::Nokhwa => "nokhwa",
            CameraBackend::TestPattern => "test-pattern",
        }
    }
}

/// Capture parameters shared by all backends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    pub camera_index: u32,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub fps: u32,
}

impl From<&RigSettings> for CaptureConfig {
    fn from(settings: &RigSettings) -> Self {
        Self {
            camera_index: settings.camera_index,
            width: settings.frame_width,
            height: settings.frame_height,
            jpeg_quality: settings.jpeg_quality,
            fps: settings.test_pattern_fps,
        }
    }
}

/// Something that can start a recording
pub trait FrameSource: Send + Sync + 'static {
    /// Open the device and start recording. Called on the capture thread.
    fn open(&self) -> Result<Box<dyn CaptureSession>, CameraError>;

    fn name(&self) -> &str;
}

/// A running recording
pub trait CaptureSession {
    /// Block until the next JPEG frame is available
    fn next_frame(&mut self) -> Result<Bytes, CameraError>;
}

/// Encode an RGB image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Bytes, CameraError> {
    let mut out = Cursor::new(Vec::with_capacity(image.as_raw().len() / 8));
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(image)?;
    Ok(Bytes::from(out.into_inner()))
}

/// Build the frame source selected in the settings
pub fn open_source(settings: &RigSettings) -> Arc<dyn FrameSource> {
    let config = CaptureConfig::from(settings);
    match settings.camera_backend {
        CameraBackend::TestPattern => Arc::new(TestPatternSource::new(config)),
        CameraBackend::Nokhwa => nokhwa_source(config),
    }
}

#[cfg(feature = "camera")]
fn nokhwa_source(config: CaptureConfig) -> Arc<dyn FrameSource> {
    Arc::new(device::NokhwaSource::new(config))
}

#[cfg(not(feature = "camera"))]
fn nokhwa_source(_config: CaptureConfig) -> Arc<dyn FrameSource> {
    Arc::new(Unavailable(CameraBackend::Nokhwa))
}

/// Placeholder for a backend left out at compile time; fails on open.
#[cfg(not(feature = "camera"))]
struct Unavailable(CameraBackend);

#[cfg(not(feature = "camera"))]
impl FrameSource for Unavailable {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CameraError> {
        Err(CameraError::BackendUnavailable(self.0.name()))
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_produces_jpeg_markers() {
        let image = RgbImage::from_pixel(32, 24, image::Rgb([200, 10, 10]));
        let jpeg = encode_jpeg(&image, 75).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_open_source_follows_settings() {
        let settings = RigSettings::simulated();
        let source = open_source(&settings);
        assert_eq!(source.name(), "test-pattern");
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_missing_backend_fails_on_open() {
        let settings = RigSettings::default();
        let source = open_source(&settings);
        assert!(matches!(
            source.open(),
            Err(CameraError::BackendUnavailable("nokhwa"))
        ));
    }
}
