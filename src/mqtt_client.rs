use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use serde::Deserialize;
use tokio::sync::mpsc;

pub use self::{
  receiver::{MqttReceiver, PublishReceiver},
  sender::{MqttSender, PublishSender},
};
use crate::error::AirlockResult;

pub mod receiver;
pub mod sender;

#[derive(Debug, Deserialize)]
pub struct MqttClientConfig {
  pub broker_domain: String,
  pub broker_port: u16,
  /// The topic our availability is announced on
  pub availability_topic: String,
  pub online_availability: String,
  pub offline_availability: String,
}

/// A message to or from the broker.
#[derive(Debug)]
pub struct MqttPublish {
  pub topic: String,
  pub qos: QoS,
  pub retain: bool,
  pub payload: String,
}

pub struct MqttClient {
  pub sender: MqttSender,
  pub receiver: MqttReceiver,
}

impl MqttClient {
  /// Create the client, returning the channel outgoing messages are queued on
  /// alongside the client itself. The broker marks us offline through the
  /// last will should the connection drop.
  pub fn with_config(client_id: &str, config: &MqttClientConfig) -> (PublishSender, MqttClient) {
    let mut options = MqttOptions::new(client_id, config.broker_domain.clone(), config.broker_port);
    options.set_last_will(LastWill::new(
      config.availability_topic.clone(),
      config.offline_availability.clone(),
      QoS::AtLeastOnce,
      true,
    ));

    let (client, event_loop) = AsyncClient::new(options, 10);
    let (send_channel, receive_channel) = mpsc::unbounded_channel();

    let sender = MqttSender::new(client.clone(), receive_channel, config);
    let receiver = MqttReceiver::new(client, event_loop);

    (send_channel, MqttClient { sender, receiver })
  }

  /// Announce our availability
  pub async fn announce(&self) -> AirlockResult<()> {
    self.sender.announce().await
  }
}
