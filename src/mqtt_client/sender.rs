use rumqttc::{AsyncClient, QoS};
use tokio::sync::mpsc;

use super::{MqttClientConfig, MqttPublish};
use crate::error::{AirlockError, AirlockResult};

pub type PublishSender = mpsc::UnboundedSender<MqttPublish>;

pub struct MqttSender {
  client: AsyncClient,
  /// The channel with which messages to send to MQTT are received on
  send_channel: mpsc::UnboundedReceiver<MqttPublish>,
  availability_topic: String,
  online_availability: String,
}

impl MqttSender {
  pub(super) fn new(
    client: AsyncClient,
    send_channel: mpsc::UnboundedReceiver<MqttPublish>,
    config: &MqttClientConfig,
  ) -> MqttSender {
    MqttSender {
      client,
      send_channel,
      availability_topic: config.availability_topic.clone(),
      online_availability: config.online_availability.clone(),
    }
  }

  pub async fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &str) -> AirlockResult<()> {
    self
      .client
      .publish(topic, qos, retain, payload)
      .await
      .map_err(|err| err.into())
  }

  /// Announce our availability
  pub async fn announce(&self) -> AirlockResult<()> {
    self
      .publish(&self.availability_topic, QoS::AtLeastOnce, true, &self.online_availability)
      .await
  }

  pub async fn send_messages(&mut self) -> AirlockResult<()> {
    loop {
      if let Some(publish) = self.send_channel.recv().await {
        self
          .client
          .publish(publish.topic, publish.qos, publish.retain, publish.payload)
          .await?;
      }
      else {
        return Err(AirlockError::MqttClosed);
      }
    }
  }
}
