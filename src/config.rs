use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSecondsWithFrac};
use toml::Value;

use crate::{error::AirlockResult, mqtt_client::MqttClientConfig, pns::PnsConfig, side::SideConfig};

/// Defaults shipped with the controller.
pub const DEFAULT_CONFIG_PATH: &str = "airlock-defaults.toml";
/// Site specific overrides, merged over the defaults key by key.
pub const OVERRIDE_CONFIG_PATH: &str = "airlock-config.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
  /// Name resolution of symbolic device names
  #[serde(default)]
  pub pns: PnsConfig,
  /// The MQTT broker the panels are reached through
  pub mqtt: MqttClientConfig,
  /// The airlock door itself
  pub door: DoorConfig,
  /// The two access sides
  pub left: SideConfig,
  pub right: SideConfig,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct DoorConfig {
  /// The drive that opens and closes the door
  pub device: String,
  pub device_side: String,

  #[serde_as(as = "DurationSecondsWithFrac<f64, Flexible>")]
  /// How long the door is held open before the automatic close begins
  pub keep_open_duration: Duration,

  #[serde_as(as = "DurationSecondsWithFrac<f64, Flexible>")]
  /// How long one open or close motion takes; the drive gives no completion
  /// signal so this is waited out in full
  pub transition_duration: Duration,
}

impl Config {
  /// Load the layered configuration. A missing layer is tolerated and logged,
  /// the remaining layer is used alone. A layer that fails to parse is fatal.
  pub fn load(defaults: &Path, overrides: &Path) -> AirlockResult<Config> {
    let base = read_layer(defaults)?;
    let over = read_layer(overrides)?;

    let merged = match (base, over) {
      (Some(mut base), Some(over)) => {
        merge_value(&mut base, over);
        base
      }
      (Some(base), None) => base,
      (None, Some(over)) => over,
      (None, None) => Value::Table(Default::default()),
    };

    Ok(merged.try_into()?)
  }
}

fn read_layer(path: &Path) -> AirlockResult<Option<Value>> {
  match fs::read_to_string(path) {
    Ok(raw) => Ok(Some(raw.parse::<Value>()?)),
    Err(err) => {
      log::warn!("unable to read configuration {:?}, continuing without it: {}", path, err);
      Ok(None)
    }
  }
}

/// Merge `over` into `base`. Tables merge key by key, recursing into nested
/// sections; any other value is replaced wholesale. Keys missing from `over`
/// keep their `base` value.
pub fn merge_value(base: &mut Value, over: Value) {
  match (base, over) {
    (Value::Table(base), Value::Table(over)) => {
      for (key, value) in over {
        match base.get_mut(&key) {
          Some(existing) => merge_value(existing, value),
          None => {
            base.insert(key, value);
          }
        }
      }
    }
    (base, over) => *base = over,
  }
}
