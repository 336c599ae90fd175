use std::fmt;

#[cfg(feature = "arm")]
use rppal::gpio::{Gpio, InputPin};

#[cfg(not(feature = "arm"))]
use crate::mock_gpio::{Gpio, InputPin};
use crate::error::AirlockResult;

use super::gpio_pin;

/// A lock authorization input: active while an external system grants a
/// temporary open authorization for one side.
pub trait LockSensor: fmt::Debug + Send {
  /// Take a single reading of the input.
  fn is_active(&mut self) -> bool;
}

#[derive(Debug)]
pub struct GpioLockSensor {
  pin: InputPin,
}

impl GpioLockSensor {
  pub fn with_handle(handle: &str) -> AirlockResult<GpioLockSensor> {
    let gpio = Gpio::new()?;
    let pin = gpio.get(gpio_pin(handle)?)?.into_input_pullup();

    Ok(GpioLockSensor { pin })
  }
}

impl LockSensor for GpioLockSensor {
  fn is_active(&mut self) -> bool {
    self.pin.is_high()
  }
}

#[cfg(test)]
pub use fake::FakeLockSensor;
