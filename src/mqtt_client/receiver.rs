use std::collections::HashMap;

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use tokio::sync::mpsc;

use super::MqttPublish;
use crate::error::AirlockResult;

pub type PublishReceiver = mpsc::UnboundedReceiver<MqttPublish>;

pub struct MqttReceiver {
  client: AsyncClient,
  event_loop: EventLoop,
  routes: TopicRoutes,
}

impl MqttReceiver {
  pub(super) fn new(client: AsyncClient, event_loop: EventLoop) -> MqttReceiver {
    MqttReceiver {
      client,
      event_loop,
      routes: TopicRoutes::default(),
    }
  }

  /// Subscribe to a topic, returning the channel its messages arrive on.
  pub async fn subscribe(&mut self, topic: &str) -> AirlockResult<PublishReceiver> {
    self.client.subscribe(topic, QoS::AtLeastOnce).await?;
    Ok(self.routes.insert(topic))
  }

  /// Drive the connection, dispatching incoming messages to subscribers.
  /// Returns only if the connection fails.
  pub async fn receive_messages(&mut self) -> AirlockResult<()> {
    loop {
      let event = self.event_loop.poll().await?;
      if let Event::Incoming(Packet::Publish(publish)) = event {
        self.routes.dispatch(MqttPublish {
          topic: publish.topic.clone(),
          qos: publish.qos,
          retain: publish.retain,
          payload: String::from_utf8_lossy(&publish.payload).into_owned(),
        });
      }
    }
  }
}

/// Exact-match routing of incoming publishes to subscriber channels.
#[derive(Debug, Default)]
struct TopicRoutes {
  channels: HashMap<String, mpsc::UnboundedSender<MqttPublish>>,
}

impl TopicRoutes {
  fn insert(&mut self, topic: &str) -> PublishReceiver {
    let (channel, receiver) = mpsc::unbounded_channel();
    self.channels.insert(topic.to_owned(), channel);
    receiver
  }

  fn dispatch(&mut self, publish: MqttPublish) {
    if let Some(channel) = self.channels.get(&publish.topic) {
      let topic = publish.topic.clone();
      if channel.send(publish).is_err() {
        log::debug!("subscriber for {} is gone, dropping its route", topic);
        self.channels.remove(&topic);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn publish(topic: &str, payload: &str) -> MqttPublish {
    MqttPublish {
      topic: topic.to_owned(),
      qos: QoS::AtLeastOnce,
      retain: false,
      payload: payload.to_owned(),
    }
  }

  #[test]
  fn dispatches_to_the_matching_subscriber() {
    let mut routes = TopicRoutes::default();
    let mut presses = routes.insert("panel/press");

    routes.dispatch(publish("panel/press", "open"));
    routes.dispatch(publish("panel/other", "ignored"));

    assert_eq!(presses.try_recv().unwrap().payload, "open");
    assert!(presses.try_recv().is_err());
  }

  #[test]
  fn drops_routes_whose_subscriber_is_gone() {
    let mut routes = TopicRoutes::default();
    drop(routes.insert("panel/press"));

    routes.dispatch(publish("panel/press", "open"));
    assert!(routes.channels.is_empty());
  }
}
