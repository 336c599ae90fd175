use std::fmt;

#[cfg(feature = "arm")]
use rppal::gpio::{Gpio, OutputPin};

#[cfg(not(feature = "arm"))]
use crate::mock_gpio::{Gpio, OutputPin};
use crate::error::AirlockResult;

use super::gpio_pin;

/// The airlock door drive.
///
/// Both commands are fire and forget; the drive reports no completion, so
/// callers wait out the configured transition duration themselves.
pub trait DoorActuator: fmt::Debug + Send {
  fn open(&mut self);
  fn close(&mut self);
}

#[derive(Debug)]
pub struct GpioDoorDrive {
  handle: String,
  pin: OutputPin,
}

impl GpioDoorDrive {
  pub fn with_handle(handle: &str) -> AirlockResult<GpioDoorDrive> {
    let gpio = Gpio::new()?;
    let pin = gpio.get(gpio_pin(handle)?)?.into_output();

    Ok(GpioDoorDrive {
      handle: handle.to_owned(),
      pin,
    })
  }
}

impl DoorActuator for GpioDoorDrive {
  fn open(&mut self) {
    log::debug!("door drive ({}) commanded open", self.handle);
    self.pin.set_high();
  }

  fn close(&mut self) {
    log::debug!("door drive ({}) commanded closed", self.handle);
    self.pin.set_low();
  }
}
