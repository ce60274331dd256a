//! Ultrasonic rangefinder (HC-SR04 style trigger/echo pair)
//!
//! A 10 µs pulse on the trigger line starts a measurement. The sensor then
//! holds the echo line high for as long as the sound took to travel to the
//! object and back.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::{EchoPin, TriggerPin};

/// Speed of sound at room temperature, 343 m/s
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34300.0;

/// Default time allowed for a whole echo cycle
pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(1);

const SETTLE_TIME: Duration = Duration::from_micros(2);
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Convert an echo pulse width to a one-way distance in centimeters,
/// rounded to two decimals.
pub fn distance_cm(elapsed: Duration) -> f64 {
    let distance = elapsed.as_secs_f64() * SPEED_OF_SOUND_CM_PER_S / 2.0;
    (distance * 100.0).round() / 100.0
}

/// Which edge the rangefinder gave up waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    EchoStart,
    EchoEnd,
}

impl TimeoutPhase {
    pub fn message(&self) -> &'static str {
        match self {
            TimeoutPhase::EchoStart => "Timeout waiting for echo start",
            TimeoutPhase::EchoEnd => "Timeout waiting for echo end",
        }
    }
}

/// Result of a single ranging cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measurement {
    Distance { distance_cm: f64 },
    Timeout(#[serde(serialize_with = "serialize_timeout")] TimeoutPhase),
}

fn serialize_timeout<S: serde::Serializer>(
    phase: &TimeoutPhase,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry("error", phase.message())?;
    map.end()
}

struct Pins {
    trigger: Box<dyn TriggerPin>,
    echo: Box<dyn EchoPin>,
}

/// Trigger/echo pin pair plus the echo timeout
pub struct Rangefinder {
    pins: Mutex<Pins>,
    timeout: Duration,
}

impl Rangefinder {
    pub fn new(trigger: Box<dyn TriggerPin>, echo: Box<dyn EchoPin>, timeout: Duration) -> Self {
        Self {
            pins: Mutex::new(Pins { trigger, echo }),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one blocking measurement cycle.
    ///
    /// Busy-polls the echo line, so callers on an async runtime should move
    /// this onto a blocking thread.
    pub fn measure(&self) -> Measurement {
        let mut pins = self.pins.lock();
        let Pins { trigger, echo } = &mut *pins;

        trigger.set_low();
        spin_for(SETTLE_TIME);
        trigger.set_high();
        spin_for(TRIGGER_PULSE);
        trigger.set_low();

        let mut start = Instant::now();
        let mut stop = start;
        // One deadline covers both edges
        let deadline = start + self.timeout;

        while !echo.is_high() {
            start = Instant::now();
            if start > deadline {
                tracing::warn!("{}", TimeoutPhase::EchoStart.message());
                return Measurement::Timeout(TimeoutPhase::EchoStart);
            }
        }

        while echo.is_high() {
            stop = Instant::now();
            if stop > deadline {
                tracing::warn!("{}", TimeoutPhase::EchoEnd.message());
                return Measurement::Timeout(TimeoutPhase::EchoEnd);
            }
        }

        let distance_cm = distance_cm(stop.saturating_duration_since(start));
        tracing::debug!(distance_cm, "Distance measured");
        Measurement::Distance { distance_cm }
    }
}

/// Sleep-free wait; thread sleeps are far too coarse for microsecond pulses.
fn spin_for(duration: Duration) {
    let began = Instant::now();
    while began.elapsed() < duration {
        std::hint::spin_loop();
    }
}
