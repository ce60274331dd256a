//! Simulated GPIO for development machines and tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::ultrasonic::SPEED_OF_SOUND_CM_PER_S;
use super::{EchoPin, HardwareError, PwmChannel, TriggerPin};

/// Latency between the end of the trigger pulse and the rising echo edge
const ECHO_DELAY: Duration = Duration::from_micros(200);

/// Farthest object the simulated rangefinder will report (100 m)
pub const MAX_SIMULATED_DISTANCE_CM: f64 = 10_000.0;

/// PWM channel that remembers the last duty cycle
#[derive(Debug, Clone, Default)]
pub struct SimulatedPwm {
    duty: Arc<Mutex<f64>>,
}

impl SimulatedPwm {
    pub fn duty_cycle(&self) -> f64 {
        *self.duty.lock()
    }
}

impl PwmChannel for SimulatedPwm {
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), HardwareError> {
        if !(0.0..=1.0).contains(&duty) {
            return Err(HardwareError::Pwm(format!(
                "duty cycle {} outside 0.0..=1.0",
                duty
            )));
        }
        *self.duty.lock() = duty;
        Ok(())
    }
}

#[derive(Debug)]
struct EchoState {
    distance_cm: f64,
    fired_at: Option<Instant>,
}

/// Echo line of a simulated rangefinder facing an object at a fixed distance.
///
/// A distance of zero or less (or one that is not finite) means nothing is in
/// range and the echo never rises.
#[derive(Debug, Clone)]
pub struct SimulatedEcho {
    state: Arc<Mutex<EchoState>>,
}

impl SimulatedEcho {
    pub fn new(distance_cm: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(EchoState {
                distance_cm,
                fired_at: None,
            })),
        }
    }

    pub fn set_distance(&self, distance_cm: f64) {
        self.state.lock().distance_cm = distance_cm;
    }

    fn fire(&self) {
        self.state.lock().fired_at = Some(Instant::now());
    }

    /// Echo width for an object at `distance_cm`; `None` when nothing is in range
    fn pulse_width(distance_cm: f64) -> Option<Duration> {
        if !(distance_cm.is_finite() && distance_cm > 0.0) {
            return None;
        }
        Duration::try_from_secs_f64(distance_cm * 2.0 / SPEED_OF_SOUND_CM_PER_S).ok()
    }
}

impl EchoPin for SimulatedEcho {
    fn is_high(&mut self) -> bool {
        let state = self.state.lock();
        match (state.fired_at, Self::pulse_width(state.distance_cm)) {
            (Some(fired_at), Some(width)) => {
                let since = fired_at.elapsed();
                since >= ECHO_DELAY && since < ECHO_DELAY + width
            }
            _ => false,
        }
    }
}

/// Trigger line that fires the simulated echo on its falling edge
#[derive(Debug)]
pub struct SimulatedTrigger {
    echo: SimulatedEcho,
    high: bool,
}

impl SimulatedTrigger {
    pub fn new(echo: SimulatedEcho) -> Self {
        Self { echo, high: false }
    }
}

impl TriggerPin for SimulatedTrigger {
    fn set_high(&mut self) {
        self.high = true;
    }

    fn set_low(&mut self) {
        if self.high {
            self.echo.fire();
        }
        self.high = false;
    }
}
