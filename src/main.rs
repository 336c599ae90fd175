#![warn(rust_2018_idioms)]

use std::{env, path::Path, process, sync::atomic::Ordering, time::Duration};

use log::LevelFilter;
use mqtt_airlock::{
  config::{Config, DEFAULT_CONFIG_PATH, OVERRIDE_CONFIG_PATH},
  coordinator::{Coordinator, StartupTask},
  error::AirlockResult,
  mqtt_client::MqttClient,
  options::Options,
  pns,
};
use simple_logger::SimpleLogger;
use tokio::{select, time::sleep};

#[tokio::main(flavor = "current_thread")]
async fn main() {
  let options = match Options::parse(env::args().skip(1)) {
    Ok(options) => options,
    Err(err) => {
      eprintln!("{}", err);
      process::exit(2);
    }
  };

  SimpleLogger::new()
    .with_level(options.log_level)
    .with_module_level("rumqttc", LevelFilter::Warn)
    .init()
    .unwrap();

  loop {
    match run().await {
      Ok(()) => return,
      Err(err) if err.is_recoverable() => {
        log::error!("connection lost, restarting in 5 seconds: {:?}", err);
        // wait some time for the broker to come back online
        sleep(Duration::from_secs(5)).await;
      }
      Err(err) => {
        log::error!("fatal: {}", err);
        process::exit(1);
      }
    }
  }
}

/// Bring the airlock up and run it until terminated.
async fn run() -> AirlockResult<()> {
  let config = Config::load(Path::new(DEFAULT_CONFIG_PATH), Path::new(OVERRIDE_CONFIG_PATH))?;

  let resolver = pns::resolver_with_config(&config.pns)?;

  let (send_channel, mut client) = MqttClient::with_config("mqtt-airlock", &config.mqtt);

  let coordinator = Coordinator::with_config(config, resolver.as_ref(), send_channel, &mut client.receiver).await?;

  client.announce().await?;

  // termination comes from outside the control loop; here that is an
  // interrupt task scheduled alongside it
  let terminate = coordinator.termination_flag();
  let interrupt: StartupTask = Box::pin(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      log::info!("interrupt received, terminating");
      terminate.store(true, Ordering::SeqCst);
    }
  });

  let mut receiver = client.receiver;
  let receive = tokio::spawn(async move { receiver.receive_messages().await });

  let mut sender = client.sender;
  let send = tokio::spawn(async move { sender.send_messages().await });

  select! {
    result = coordinator.run(vec![interrupt]) => result,
    // the MQTT tasks only end if the broker connection fails
    joined = receive => joined?,
    joined = send => joined?,
  }
}
