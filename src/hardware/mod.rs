//! Hardware access for the rig
//!
//! The LED and the ultrasonic rangefinder talk to GPIO through the small
//! traits below. The Raspberry Pi backend (feature `rpi`) implements them on
//! top of `rppal`; the simulated backend runs anywhere.

pub mod led;
#[cfg(feature = "rpi")]
pub mod rpi;
pub mod simulated;
pub mod ultrasonic;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use led::{duty_cycle, Led};
pub use simulated::{SimulatedEcho, SimulatedPwm, SimulatedTrigger, MAX_SIMULATED_DISTANCE_CM};
pub use ultrasonic::{distance_cm, Measurement, Rangefinder, TimeoutPhase, DEFAULT_ECHO_TIMEOUT};

use crate::settings::RigSettings;

/// Hardware-related errors
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("PWM error: {0}")]
    Pwm(String),
    #[error("hardware backend '{0}' is not compiled into this build")]
    BackendUnavailable(&'static str),
}

/// A PWM output that accepts a duty cycle in `0.0..=1.0`
pub trait PwmChannel: Send {
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), HardwareError>;
}

/// Digital output driving the rangefinder trigger line
pub trait TriggerPin: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Digital input reading the rangefinder echo line
pub trait EchoPin: Send {
    fn is_high(&mut self) -> bool;
}

/// Which driver implementation backs the LED and the rangefinder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareBackend {
    /// Raspberry Pi GPIO via rppal
    #[default]
    Rpi,
    /// In-process simulation, no hardware needed
    Simulated,
}

impl HardwareBackend {
    pub fn name(&self) -> &'static str {
        match self {
            HardwareBackend::Rpi => "rpi",
            HardwareBackend::Simulated => "simulated",
        }
    }
}

/// Hardware handles created once at startup
pub struct Hardware {
    pub led: Led,
    pub rangefinder: Rangefinder,
}

impl Hardware {
    /// Open the LED and rangefinder for the configured backend
    pub fn open(settings: &RigSettings) -> Result<Self, HardwareError> {
        let timeout = Duration::from_millis(settings.echo_timeout_ms);

        match settings.hardware_backend {
            HardwareBackend::Rpi => Self::open_rpi(settings, timeout),
            HardwareBackend::Simulated => {
                let echo = SimulatedEcho::new(settings.simulated_distance_cm);
                let trigger = SimulatedTrigger::new(echo.clone());
                tracing::info!(
                    distance_cm = settings.simulated_distance_cm,
                    "Using simulated hardware"
                );
                Ok(Self {
                    led: Led::new(Box::new(SimulatedPwm::default())),
                    rangefinder: Rangefinder::new(Box::new(trigger), Box::new(echo), timeout),
                })
            }
        }
    }

    #[cfg(feature = "rpi")]
    fn open_rpi(settings: &RigSettings, timeout: Duration) -> Result<Self, HardwareError> {
        let pwm = rpi::RpiPwm::new(settings.led_pin, settings.pwm_frequency_hz)?;
        let (trigger, echo) = rpi::open_rangefinder_pins(settings.trigger_pin, settings.echo_pin)?;
        tracing::info!(
            led_pin = settings.led_pin,
            trigger_pin = settings.trigger_pin,
            echo_pin = settings.echo_pin,
            "Raspberry Pi GPIO initialized"
        );
        Ok(Self {
            led: Led::new(Box::new(pwm)),
            rangefinder: Rangefinder::new(Box::new(trigger), Box::new(echo), timeout),
        })
    }

    #[cfg(not(feature = "rpi"))]
    fn open_rpi(_settings: &RigSettings, _timeout: Duration) -> Result<Self, HardwareError> {
        Err(HardwareError::BackendUnavailable("rpi"))
    }
}
