//! Raspberry Pi GPIO backend built on rppal
//!
//! Pin numbers are BCM GPIO numbers, not physical header positions.

use rppal::gpio::{Gpio, InputPin, OutputPin};

use super::{EchoPin, HardwareError, PwmChannel, TriggerPin};

fn gpio_error(e: rppal::gpio::Error) -> HardwareError {
    HardwareError::Gpio(e.to_string())
}

/// Software PWM on a GPIO output
pub struct RpiPwm {
    pin: OutputPin,
    frequency_hz: f64,
}

impl RpiPwm {
    pub fn new(bcm_pin: u8, frequency_hz: f64) -> Result<Self, HardwareError> {
        let pin = Gpio::new()
            .map_err(gpio_error)?
            .get(bcm_pin)
            .map_err(gpio_error)?
            .into_output_low();
        Ok(Self { pin, frequency_hz })
    }
}

impl PwmChannel for RpiPwm {
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), HardwareError> {
        self.pin
            .set_pwm_frequency(self.frequency_hz, duty)
            .map_err(|e| HardwareError::Pwm(e.to_string()))
    }
}

pub struct RpiTrigger(OutputPin);

impl TriggerPin for RpiTrigger {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }
}

pub struct RpiEcho(InputPin);

impl EchoPin for RpiEcho {
    fn is_high(&mut self) -> bool {
        self.0.is_high()
    }
}

/// Claim the trigger (output, starts low) and echo (input) lines
pub fn open_rangefinder_pins(
    trigger_pin: u8,
    echo_pin: u8,
) -> Result<(RpiTrigger, RpiEcho), HardwareError> {
    let gpio = Gpio::new().map_err(gpio_error)?;
    let trigger = gpio.get(trigger_pin).map_err(gpio_error)?.into_output_low();
    let echo = gpio.get(echo_pin).map_err(gpio_error)?.into_input();
    Ok((RpiTrigger(trigger), RpiEcho(echo)))
}
