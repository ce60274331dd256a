//! PWM-dimmed LED

use parking_lot::Mutex;

use super::{HardwareError, PwmChannel};

/// Map a brightness percentage to a PWM duty cycle.
///
/// The value is not clamped; out-of-range input is left to the driver.
pub fn duty_cycle(percent: f64) -> f64 {
    percent / 100.0
}

struct LedState {
    channel: Box<dyn PwmChannel>,
    brightness: f64,
}

/// LED on a PWM channel, brightness given in percent
pub struct Led {
    state: Mutex<LedState>,
}

impl Led {
    pub fn new(channel: Box<dyn PwmChannel>) -> Self {
        Self {
            state: Mutex::new(LedState {
                channel,
                brightness: 0.0,
            }),
        }
    }

    /// Write `percent / 100` to the PWM channel and echo the percentage back
    pub fn set_brightness(&self, percent: f64) -> Result<f64, HardwareError> {
        let mut state = self.state.lock();
        state.channel.set_duty_cycle(duty_cycle(percent))?;
        state.brightness = percent;
        tracing::debug!(brightness = percent, "LED brightness updated");
        Ok(percent)
    }

    /// Last brightness percentage successfully written
    pub fn brightness(&self) -> f64 {
        self.state.lock().brightness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedPwm;

    #[test]
    fn test_duty_cycle_mapping() {
        assert_eq!(duty_cycle(0.0), 0.0);
        assert_eq!(duty_cycle(50.0), 0.5);
        assert_eq!(duty_cycle(100.0), 1.0);
        assert_eq!(duty_cycle(12.5), 0.125);
    }

    #[test]
    fn test_out_of_range_is_passed_through() {
        assert_eq!(duty_cycle(150.0), 1.5);
        assert_eq!(duty_cycle(-10.0), -0.1);
    }

    #[test]
    fn test_set_brightness_writes_duty_cycle() {
        let pwm = SimulatedPwm::default();
        let probe = pwm.clone();
        let led = Led::new(Box::new(pwm));

        assert_eq!(led.set_brightness(40.0).unwrap(), 40.0);
        assert_eq!(probe.duty_cycle(), 0.4);
        assert_eq!(led.brightness(), 40.0);
    }

    #[test]
    fn test_driver_rejection_keeps_previous_brightness() {
        let led = Led::new(Box::new(SimulatedPwm::default()));
        led.set_brightness(20.0).unwrap();

        assert!(led.set_brightness(250.0).is_err());
        assert_eq!(led.brightness(), 20.0);
    }
}
