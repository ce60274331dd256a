//! Settings management for the rig server
//!
//! Settings live in an XML file. Every field has a default, so a partial file
//! (or no file at all) is valid.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::camera::CameraBackend;
use crate::hardware::{HardwareBackend, DEFAULT_ECHO_TIMEOUT, MAX_SIMULATED_DISTANCE_CM};

/// Environment variable that overrides the settings file location
pub const CONFIG_ENV: &str = "RIG_CONFIG";

/// Server settings stored in `settings.xml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "RigSettings")]
pub struct RigSettings {
    /// HTTP/WebSocket listen port
    #[serde(rename = "port", default = "default_port")]
    pub port: u16,

    /// Driver used for the LED and rangefinder
    #[serde(rename = "hardwareBackend", default)]
    pub hardware_backend: HardwareBackend,

    /// BCM pin driving the LED
    #[serde(rename = "ledPin", default = "default_led_pin")]
    pub led_pin: u8,

    /// Software PWM frequency for the LED
    #[serde(rename = "pwmFrequencyHz", default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: f64,

    /// BCM pin wired to the rangefinder trigger (physical pin 13)
    #[serde(rename = "triggerPin", default = "default_trigger_pin")]
    pub trigger_pin: u8,

    /// BCM pin wired to the rangefinder echo (physical pin 15)
    #[serde(rename = "echoPin", default = "default_echo_pin")]
    pub echo_pin: u8,

    /// Time allowed for a full echo cycle
    #[serde(rename = "echoTimeoutMs", default = "default_echo_timeout_ms")]
    pub echo_timeout_ms: u64,

    /// Object distance reported by the simulated rangefinder (<= 0: nothing in range)
    #[serde(rename = "simulatedDistanceCm", default = "default_simulated_distance_cm")]
    pub simulated_distance_cm: f64,

    /// Frame source for the stream
    #[serde(rename = "cameraBackend", default)]
    pub camera_backend: CameraBackend,

    /// Camera device index
    #[serde(rename = "cameraIndex", default)]
    pub camera_index: u32,

    #[serde(rename = "frameWidth", default = "default_frame_width")]
    pub frame_width: u32,

    #[serde(rename = "frameHeight", default = "default_frame_height")]
    pub frame_height: u32,

    /// JPEG quality (1-100)
    #[serde(rename = "jpegQuality", default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Frame rate of the test pattern source
    #[serde(rename = "testPatternFps", default = "default_test_pattern_fps")]
    pub test_pattern_fps: u32,

    /// Frames buffered per WebSocket viewer before new frames are skipped
    #[serde(rename = "subscriberQueue", default = "default_subscriber_queue")]
    pub subscriber_queue: usize,

    /// Start capturing as soon as the first viewer connects
    #[serde(rename = "autostartOnSubscribe", default = "default_true")]
    pub autostart_on_subscribe: bool,

    /// Emit JSON log lines
    #[serde(rename = "logJson", default)]
    pub log_json: bool,

    /// Also write logs to this file
    #[serde(rename = "logFile", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

fn default_port() -> u16 {
    8000
}

fn default_led_pin() -> u8 {
    17
}

fn default_pwm_frequency_hz() -> f64 {
    100.0
}

fn default_trigger_pin() -> u8 {
    27
}

fn default_echo_pin() -> u8 {
    22
}

fn default_echo_timeout_ms() -> u64 {
    DEFAULT_ECHO_TIMEOUT.as_millis() as u64
}

fn default_simulated_distance_cm() -> f64 {
    42.0
}

fn default_frame_width() -> u32 {
    640
}

fn default_frame_height() -> u32 {
    480
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_test_pattern_fps() -> u32 {
    30
}

fn default_subscriber_queue() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            hardware_backend: HardwareBackend::default(),
            led_pin: default_led_pin(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
            trigger_pin: default_trigger_pin(),
            echo_pin: default_echo_pin(),
            echo_timeout_ms: default_echo_timeout_ms(),
            simulated_distance_cm: default_simulated_distance_cm(),
            camera_backend: CameraBackend::default(),
            camera_index: 0,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            jpeg_quality: default_jpeg_quality(),
            test_pattern_fps: default_test_pattern_fps(),
            subscriber_queue: default_subscriber_queue(),
            autostart_on_subscribe: true,
            log_json: false,
            log_file: None,
        }
    }
}

impl RigSettings {
    /// Settings for running without any hardware attached
    pub fn simulated() -> Self {
        Self {
            hardware_backend: HardwareBackend::Simulated,
            camera_backend: CameraBackend::TestPattern,
            ..Self::default()
        }
    }

    /// Clamp values into ranges the drivers accept
    pub fn sanitize(&mut self) {
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.test_pattern_fps = self.test_pattern_fps.clamp(1, 120);
        self.subscriber_queue = self.subscriber_queue.max(1);
        self.echo_timeout_ms = self.echo_timeout_ms.max(1);
        self.frame_width = self.frame_width.max(16);
        self.frame_height = self.frame_height.max(16);
        if self.pwm_frequency_hz.is_nan() || self.pwm_frequency_hz <= 0.0 {
            self.pwm_frequency_hz = default_pwm_frequency_hz();
        }
        // Not finite means nothing in range
        if !self.simulated_distance_cm.is_finite() {
            self.simulated_distance_cm = 0.0;
        }
        self.simulated_distance_cm = self.simulated_distance_cm.min(MAX_SIMULATED_DISTANCE_CM);
    }

    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|mut p| {
            p.push("RigServer");
            p.push("settings.xml");
            p
        })
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = from_str(&contents)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, formatted)?;
        Ok(())
    }
}

/// Settings-related errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}
