use std::{
  collections::HashMap,
  fmt, fs,
  path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
  config::Config,
  device::DeviceAddress,
  error::{AirlockError, AirlockResult},
};

pub const DEFAULT_DIRECTORY_PATH: &str = "pns-directory.toml";

#[derive(Debug, Deserialize)]
pub struct PnsConfig {
  #[serde(default)]
  pub enabled: bool,
  /// The naming context the symbolic names live under
  pub prefix: Option<String>,
  /// Where the name table lives; defaults to `pns-directory.toml`
  pub directory: Option<PathBuf>,
}

impl Default for PnsConfig {
  fn default() -> PnsConfig {
    PnsConfig {
      enabled: false,
      prefix: None,
      directory: None,
    }
  }
}

/// Startup-only translation of symbolic device names to physical handles.
pub trait Resolve: fmt::Debug {
  fn resolve(&self, address: &DeviceAddress) -> AirlockResult<String>;
}

/// Used when PNS is disabled: device names already are physical handles.
#[derive(Debug)]
pub struct Passthrough;

impl Resolve for Passthrough {
  fn resolve(&self, address: &DeviceAddress) -> AirlockResult<String> {
    Ok(address.device.clone())
  }
}

/// A name table loaded once at startup.
#[derive(Debug)]
pub struct PnsDirectory {
  prefix: Option<String>,
  entries: HashMap<String, String>,
}

impl PnsDirectory {
  pub fn new(prefix: Option<String>, entries: HashMap<String, String>) -> PnsDirectory {
    PnsDirectory { prefix, entries }
  }

  pub fn load(path: &Path, prefix: Option<String>) -> AirlockResult<PnsDirectory> {
    let raw = fs::read_to_string(path).map_err(|_| AirlockError::PnsDirectoryUnavailable(path.to_owned()))?;
    let entries: HashMap<String, String> = toml::from_str(&raw)?;
    log::info!("loaded {} PNS entries from {:?}", entries.len(), path);

    Ok(PnsDirectory { prefix, entries })
  }
}

impl Resolve for PnsDirectory {
  fn resolve(&self, address: &DeviceAddress) -> AirlockResult<String> {
    let name = match &self.prefix {
      Some(prefix) => format!("{}/{}", prefix, address.qualified()),
      None => address.qualified(),
    };

    self
      .entries
      .get(&name)
      .cloned()
      .ok_or(AirlockError::ResolutionFailure(name))
  }
}

pub fn resolver_with_config(config: &PnsConfig) -> AirlockResult<Box<dyn Resolve>> {
  if config.enabled {
    let path = config
      .directory
      .clone()
      .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY_PATH));
    Ok(Box::new(PnsDirectory::load(&path, config.prefix.clone())?))
  }
  else {
    Ok(Box::new(Passthrough))
  }
}

/// Rewrite every device identifier in the door and side sections to its
/// physical handle. Runs once at startup, before any device is constructed.
pub fn resolve_devices(config: &mut Config, resolver: &dyn Resolve) -> AirlockResult<()> {
  let door = DeviceAddress::new(config.door.device.clone(), Some(config.door.device_side.clone()));
  config.door.device = resolver.resolve(&door)?;

  for side in [&mut config.left, &mut config.right] {
    if let Some(lock) = &mut side.lock {
      if let Some(device) = &lock.device {
        // an empty device reference means the side has no sensor
        if !device.is_empty() {
          let address = DeviceAddress::new(device.clone(), lock.device_side.clone());
          lock.device = Some(resolver.resolve(&address)?);
        }
      }
    }

    let panel = DeviceAddress::new(side.panel.device.clone(), None);
    side.panel.device = resolver.resolve(&panel)?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn directory() -> PnsDirectory {
    let entries = [
      ("lab/door-drive/front", "gpio17"),
      ("lab/left-lock", "gpio22"),
      ("lab/left-panel", "lab/panels/left"),
      ("lab/right-panel", "lab/panels/right"),
    ]
    .into_iter()
    .map(|(name, handle)| (name.to_owned(), handle.to_owned()))
    .collect();

    PnsDirectory::new(Some("lab".to_owned()), entries)
  }

  #[test]
  fn resolves_prefixed_names() {
    let address = DeviceAddress::new("door-drive", Some("front".to_owned()));
    assert_eq!(directory().resolve(&address).unwrap(), "gpio17");
  }

  #[test]
  fn unresolved_names_are_an_error() {
    let address = DeviceAddress::new("nonexistent", None);
    assert!(matches!(
      directory().resolve(&address),
      Err(AirlockError::ResolutionFailure(_))
    ));
  }

  #[test]
  fn passthrough_returns_the_device_name_verbatim() {
    let address = DeviceAddress::new("gpio4", Some("front".to_owned()));
    assert_eq!(Passthrough.resolve(&address).unwrap(), "gpio4");
  }

  #[test]
  fn rewrites_all_device_references() {
    let mut config: Config = toml::from_str(
      r#"
      [mqtt]
      broker_domain = "broker.local"
      broker_port = 1883
      availability_topic = "airlock/availability"
      online_availability = "online"
      offline_availability = "offline"

      [door]
      device = "door-drive"
      device_side = "front"
      keep_open_duration = 5
      transition_duration = 2

      [left.lock]
      device = "left-lock"

      [left.panel]
      device = "left-panel"
      room = {}

      [right.lock]
      device = ""

      [right.panel]
      device = "right-panel"
      room = {}
      "#,
    )
    .unwrap();

    resolve_devices(&mut config, &directory()).unwrap();

    assert_eq!(config.door.device, "gpio17");
    assert_eq!(config.left.lock.as_ref().unwrap().device.as_deref(), Some("gpio22"));
    assert_eq!(config.left.panel.device, "lab/panels/left");
    // empty lock references are left alone, the side simply has no sensor
    assert_eq!(config.right.lock.as_ref().unwrap().device.as_deref(), Some(""));
    assert_eq!(config.right.panel.device, "lab/panels/right");
  }
}
