use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinError;

pub type AirlockResult<T> = Result<T, AirlockError>;

#[derive(Debug, Error)]
pub enum AirlockError {
  #[error("invalid option: {0}")]
  OptionInvalid(String),
  #[error("unable to parse configuration: {0}")]
  ConfigMalformed(#[from] toml::de::Error),
  #[error("invalid configuration: {0}")]
  ConfigInvalid(String),
  #[error("unable to read PNS directory {0:?}")]
  PnsDirectoryUnavailable(PathBuf),
  #[error("unable to resolve device name {0:?}")]
  ResolutionFailure(String),
  #[error("device not found: {0:?}")]
  DeviceNotFound(String),
  #[cfg(feature = "arm")]
  #[error(transparent)]
  Gpio(#[from] rppal::gpio::Error),
  #[cfg(not(feature = "arm"))]
  #[error(transparent)]
  Gpio(#[from] crate::mock_gpio::Error),
  #[error(transparent)]
  MqttClient(#[from] rumqttc::ClientError),
  #[error(transparent)]
  MqttConnection(#[from] rumqttc::ConnectionError),
  #[error("the MQTT client has been closed")]
  MqttClosed,
  #[error(transparent)]
  JoinError(#[from] JoinError),
}

impl AirlockError {
  /// True if the broker connection dropped and may come back, in which case
  /// the whole run is restarted rather than aborted.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      AirlockError::MqttClient(_) | AirlockError::MqttConnection(_) | AirlockError::MqttClosed
    )
  }
}
