use std::fmt;

use rumqttc::QoS;
use serde::Deserialize;

use crate::mqtt_client::{MqttPublish, PublishSender};

#[derive(Debug, Deserialize)]
pub struct PanelConfig {
  /// The panel device showing this side's state
  pub device: String,
  pub room: RoomConfig,
}

/// Details of the room behind the side, shown on the panel face.
#[derive(Debug, Default, Deserialize)]
pub struct RoomConfig {
  pub name: Option<String>,
  pub number: Option<i64>,
  pub hazard: Option<String>,
}

/// One wall panel: a locked indicator and an open button.
///
/// The panel firmware renders whatever we publish under the panel's topic
/// root. `locked` and `suspended` are independent; a panel can be suspended
/// while showing unlocked.
#[derive(Debug)]
pub struct Panel {
  topic: String,
  locked: bool,
  suspended: bool,
  mqtt_tx: PublishSender,
}

impl fmt::Display for Panel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Panel ({})", self.topic)
  }
}

impl Panel {
  /// `topic` is the panel's resolved physical handle, the root of its topics.
  /// Construction publishes the static room descriptor and the initial
  /// unlocked, unsuspended state.
  pub fn with_config(topic: String, room: &RoomConfig, mqtt_tx: PublishSender) -> Panel {
    let panel = Panel {
      topic,
      locked: false,
      suspended: false,
      mqtt_tx,
    };

    panel.publish_room(room);
    panel.publish_state();
    panel
  }

  /// The topic the panel's open button publishes presses on.
  pub fn press_topic(&self) -> String {
    format!("{}/press", self.topic)
  }

  pub fn locked(&self) -> bool {
    self.locked
  }

  pub fn suspended(&self) -> bool {
    self.suspended
  }

  pub fn set_locked(&mut self, locked: bool) {
    self.locked = locked;
    self.publish_state();
  }

  /// Disable the open button for the duration of a door cycle. Idempotent.
  pub fn suspend(&mut self) {
    self.suspended = true;
    self.publish_state();
  }

  /// Re-enable the open button. Idempotent.
  pub fn resume(&mut self) {
    self.suspended = false;
    self.publish_state();
  }

  fn publish_state(&self) {
    let payload = serde_json::json!({
      "locked": self.locked,
      "suspended": self.suspended,
    });
    self.send(format!("{}/state", self.topic), payload.to_string());
  }

  fn publish_room(&self, room: &RoomConfig) {
    let payload = serde_json::json!({
      "name": room.name,
      "number": room.number,
      "hazard": room.hazard,
    });
    self.send(format!("{}/room", self.topic), payload.to_string());
  }

  fn send(&self, topic: String, payload: String) {
    let publish = MqttPublish {
      topic,
      qos: QoS::AtLeastOnce,
      retain: true,
      payload,
    };
    if self.mqtt_tx.send(publish).is_err() {
      log::debug!("{} could not publish, the MQTT channel is closed", self);
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::Value;
  use tokio::sync::mpsc::{self, UnboundedReceiver};

  use super::*;

  fn panel() -> (Panel, UnboundedReceiver<MqttPublish>) {
    let (mqtt_tx, mqtt_rx) = mpsc::unbounded_channel();
    let room = RoomConfig {
      name: Some("Decontamination".to_owned()),
      number: Some(12),
      hazard: None,
    };
    (Panel::with_config("lab/panels/left".to_owned(), &room, mqtt_tx), mqtt_rx)
  }

  fn state(publish: &MqttPublish) -> (bool, bool) {
    let value: Value = serde_json::from_str(&publish.payload).unwrap();
    (value["locked"].as_bool().unwrap(), value["suspended"].as_bool().unwrap())
  }

  #[test]
  fn construction_announces_room_and_initial_state() {
    let (_panel, mut mqtt_rx) = panel();

    let room = mqtt_rx.try_recv().unwrap();
    assert_eq!(room.topic, "lab/panels/left/room");
    assert!(room.retain);
    let value: Value = serde_json::from_str(&room.payload).unwrap();
    assert_eq!(value["name"], "Decontamination");
    assert_eq!(value["number"], 12);

    let initial = mqtt_rx.try_recv().unwrap();
    assert_eq!(initial.topic, "lab/panels/left/state");
    assert_eq!(state(&initial), (false, false));
  }

  #[test]
  fn locked_and_suspended_are_independent() {
    let (mut panel, mut mqtt_rx) = panel();
    while mqtt_rx.try_recv().is_ok() {}

    panel.suspend();
    panel.set_locked(false);

    assert!(panel.suspended());
    assert!(!panel.locked());
    assert_eq!(state(&mqtt_rx.try_recv().unwrap()), (false, true));
    assert_eq!(state(&mqtt_rx.try_recv().unwrap()), (false, true));
  }

  #[test]
  fn suspend_and_resume_are_idempotent() {
    let (mut panel, _mqtt_rx) = panel();

    panel.suspend();
    panel.suspend();
    assert!(panel.suspended());

    panel.resume();
    panel.resume();
    assert!(!panel.suspended());
  }

  #[test]
  fn set_locked_publishes_the_indicator() {
    let (mut panel, mut mqtt_rx) = panel();
    while mqtt_rx.try_recv().is_ok() {}

    panel.set_locked(true);
    assert!(panel.locked());

    let publish = mqtt_rx.try_recv().unwrap();
    assert_eq!(publish.topic, "lab/panels/left/state");
    assert_eq!(state(&publish), (true, false));
  }
}
