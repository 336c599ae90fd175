use std::fmt;

use crate::error::{AirlockError, AirlockResult};

pub mod drive;
pub mod sensor;

pub use drive::{DoorActuator, GpioDoorDrive};
pub use sensor::{GpioLockSensor, LockSensor};

/// A device reference from the configuration: the symbolic device name plus
/// the side of the device the airlock is wired to, if the device has more
/// than one.
#[derive(Debug, Clone)]
pub struct DeviceAddress {
  pub device: String,
  pub side: Option<String>,
}

impl DeviceAddress {
  pub fn new(device: impl Into<String>, side: Option<String>) -> DeviceAddress {
    DeviceAddress {
      device: device.into(),
      side,
    }
  }

  /// The name the device is looked up under, e.g. `door-drive/front`.
  pub fn qualified(&self) -> String {
    match &self.side {
      Some(side) => format!("{}/{}", self.device, side),
      None => self.device.clone(),
    }
  }
}

impl fmt::Display for DeviceAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.qualified())
  }
}

/// Physical GPIO handles look like `gpio17` (BCM numbering).
pub(crate) fn gpio_pin(handle: &str) -> AirlockResult<u8> {
  handle
    .strip_prefix("gpio")
    .and_then(|number| number.parse::<u8>().ok())
    .filter(|pin| *pin <= 27)
    .ok_or_else(|| AirlockError::DeviceNotFound(handle.to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_gpio_handles() {
    assert_eq!(gpio_pin("gpio17").unwrap(), 17);
    assert_eq!(gpio_pin("gpio0").unwrap(), 0);
  }

  #[test]
  fn rejects_non_gpio_handles() {
    assert!(matches!(gpio_pin(""), Err(AirlockError::DeviceNotFound(_))));
    assert!(matches!(gpio_pin("relay3"), Err(AirlockError::DeviceNotFound(_))));
    assert!(matches!(gpio_pin("gpio99"), Err(AirlockError::DeviceNotFound(_))));
  }

  #[test]
  fn qualifies_addresses_with_their_side() {
    let address = DeviceAddress::new("door-drive", Some("front".to_owned()));
    assert_eq!(address.qualified(), "door-drive/front");

    let address = DeviceAddress::new("left-lock", None);
    assert_eq!(address.qualified(), "left-lock");
  }
}
