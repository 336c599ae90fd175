use std::fmt;

use serde::Deserialize;

use crate::{
  device::{GpioLockSensor, LockSensor},
  error::{AirlockError, AirlockResult},
  mqtt_client::{MqttReceiver, PublishReceiver, PublishSender},
  panel::{Panel, PanelConfig},
};

/// Seconds a side stays unlocked when the configuration gives no duration.
pub const DEFAULT_UNLOCK_DURATION: f64 = 10.0;

#[derive(Debug, Deserialize)]
pub struct SideConfig {
  /// The lock authorization sensor, if the side has one
  pub lock: Option<LockConfig>,
  pub panel: PanelConfig,
}

#[derive(Debug, Deserialize)]
pub struct LockConfig {
  /// The sensor device; absent or empty means the side never locks
  pub device: Option<String>,
  pub device_side: Option<String>,
  /// The authorization level the reader grants, 1 to 5
  pub level: Option<u8>,
  /// How many seconds one authorization keeps the side unlocked
  pub unlock_duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideId {
  Left,
  Right,
}

impl fmt::Display for SideId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SideId::Left => write!(f, "left"),
      SideId::Right => write!(f, "right"),
    }
  }
}

/// The lock capability of a side, present only when a sensor is configured.
#[derive(Debug)]
pub struct Lock {
  sensor: Box<dyn LockSensor>,
  unlock_duration: f64,
  /// Remaining authorized-open seconds; may run negative, never clamped
  countdown: f64,
}

impl Lock {
  pub fn new(sensor: Box<dyn LockSensor>, unlock_duration: f64) -> Lock {
    Lock {
      sensor,
      unlock_duration,
      countdown: 0.0,
    }
  }
}

/// One access side of the airlock.
#[derive(Debug)]
pub struct Side {
  id: SideId,
  lock: Option<Lock>,
  pub panel: Panel,
  press: Option<PublishReceiver>,
}

impl fmt::Display for Side {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Side ({})", self.id)
  }
}

impl Side {
  /// Device references in `config` must already be resolved to physical
  /// handles.
  pub async fn with_config(
    id: SideId,
    config: &SideConfig,
    mqtt_tx: PublishSender,
    mqtt_rx: &mut MqttReceiver,
  ) -> AirlockResult<Side> {
    let lock = match &config.lock {
      Some(lock_config) => match lock_config.device.as_deref() {
        Some(device) if !device.is_empty() => {
          if let Some(level) = lock_config.level {
            if !(1..=5).contains(&level) {
              return Err(AirlockError::ConfigInvalid(format!(
                "{} lock level {} is out of range 1..=5",
                id, level
              )));
            }
          }

          let sensor = GpioLockSensor::with_handle(device)?;
          let unlock_duration = lock_config.unlock_duration.unwrap_or(DEFAULT_UNLOCK_DURATION);
          log::info!("{} side lock sensor on {}, unlocks for {}s", id, device, unlock_duration);

          Some(Lock::new(Box::new(sensor), unlock_duration))
        }
        _ => None,
      },
      None => None,
    };

    let panel = Panel::with_config(config.panel.device.clone(), &config.panel.room, mqtt_tx);
    let press = mqtt_rx.subscribe(&panel.press_topic()).await?;

    Ok(Side::new(id, lock, panel).with_press_stream(press))
  }

  pub fn new(id: SideId, lock: Option<Lock>, panel: Panel) -> Side {
    Side {
      id,
      lock,
      panel,
      press: None,
    }
  }

  pub(crate) fn with_press_stream(mut self, press: PublishReceiver) -> Side {
    self.press = Some(press);
    self
  }

  pub fn id(&self) -> SideId {
    self.id
  }

  /// Remaining authorized-open seconds, if the side has a sensor.
  pub fn countdown(&self) -> Option<f64> {
    self.lock.as_ref().map(|lock| lock.countdown)
  }

  /// Take the open-button message stream. Consumed once, when the side's
  /// interactive execution begins.
  pub fn take_press_stream(&mut self) -> Option<PublishReceiver> {
    self.press.take()
  }

  /// One control tick of the lock state machine, `delta` seconds after the
  /// previous one. A side without a sensor never transitions.
  pub fn update(&mut self, delta: f64) {
    let Some(lock) = &mut self.lock else { return };

    let active = lock.sensor.is_active();
    if active && lock.countdown <= 0.0 {
      // a fresh authorization opens the window
      lock.countdown = lock.unlock_duration;
      log::debug!("{} side authorized, unlocking for {}s", self.id, lock.unlock_duration);
      self.panel.set_locked(false);
    }
    else if !active && lock.countdown > 0.0 {
      lock.countdown -= delta;
    }
    else if !active && lock.countdown <= 0.0 && !self.panel.locked() {
      log::debug!("{} side authorization expired, locking", self.id);
      self.panel.set_locked(true);
    }
    // an active reading inside an open window does not re-arm the timer
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  };

  use tokio::sync::mpsc::{self, UnboundedReceiver};

  use super::*;
  use crate::{device::sensor::FakeLockSensor, mqtt_client::MqttPublish, panel::RoomConfig};

  fn sensored_side(active: bool, unlock_duration: f64) -> (Side, Arc<AtomicBool>, UnboundedReceiver<MqttPublish>) {
    let (mqtt_tx, mqtt_rx) = mpsc::unbounded_channel();
    let panel = Panel::with_config("panel".to_owned(), &RoomConfig::default(), mqtt_tx);
    let (sensor, flag) = FakeLockSensor::new(active);
    let lock = Lock::new(Box::new(sensor), unlock_duration);

    (Side::new(SideId::Left, Some(lock), panel), flag, mqtt_rx)
  }

  fn bare_side() -> Side {
    let (mqtt_tx, _mqtt_rx) = mpsc::unbounded_channel();
    let panel = Panel::with_config("panel".to_owned(), &RoomConfig::default(), mqtt_tx);
    Side::new(SideId::Right, None, panel)
  }

  #[test]
  fn side_without_sensor_never_transitions() {
    let mut side = bare_side();
    assert!(side.countdown().is_none());

    for delta in [0.0, 0.25, 10.0, 1000.0] {
      side.update(delta);
      assert!(!side.panel.locked());
    }
  }

  #[test]
  fn authorization_opens_the_unlock_window() {
    let (mut side, _flag, _mqtt_rx) = sensored_side(true, 8.0);

    side.update(0.25);

    assert_eq!(side.countdown(), Some(8.0));
    assert!(!side.panel.locked());
  }

  #[test]
  fn authorization_reopens_an_overrun_window() {
    let (mut side, flag, _mqtt_rx) = sensored_side(true, 8.0);

    // run the previous window well past zero
    side.update(0.25);
    flag.store(false, Ordering::Relaxed);
    side.update(10.0);
    assert_eq!(side.countdown(), Some(-2.0));

    flag.store(true, Ordering::Relaxed);
    side.update(0.25);
    assert_eq!(side.countdown(), Some(8.0));
    assert!(!side.panel.locked());
  }

  #[test]
  fn window_counts_down_exactly_without_clamping() {
    let (mut side, flag, _mqtt_rx) = sensored_side(true, 1.0);

    side.update(0.25);
    flag.store(false, Ordering::Relaxed);

    side.update(0.25);
    assert_eq!(side.countdown(), Some(0.75));
    side.update(0.5);
    assert_eq!(side.countdown(), Some(0.25));
    side.update(1.0);
    assert_eq!(side.countdown(), Some(-0.75));
  }

  #[test]
  fn expired_window_locks_the_side() {
    let (mut side, _flag, _mqtt_rx) = sensored_side(false, 8.0);

    assert!(!side.panel.locked());
    side.update(0.25);
    assert!(side.panel.locked());
  }

  #[test]
  fn active_sensor_inside_open_window_does_not_rearm() {
    let (mut side, flag, _mqtt_rx) = sensored_side(true, 8.0);

    side.update(0.25);
    flag.store(false, Ordering::Relaxed);
    side.update(0.25);
    side.update(0.25);
    assert_eq!(side.countdown(), Some(7.5));

    // the repeated authorization must not refresh the timer
    flag.store(true, Ordering::Relaxed);
    side.update(0.25);
    assert_eq!(side.countdown(), Some(7.5));
    assert!(!side.panel.locked());
  }
}
