use std::{
  future::Future,
  pin::Pin,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

use tokio::{
  select,
  sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
  time::{self, Instant, Sleep},
};

use crate::{
  config::Config,
  device::{DoorActuator, GpioDoorDrive},
  error::AirlockResult,
  mqtt_client::{MqttReceiver, PublishReceiver, PublishSender},
  pns::{self, Resolve},
  side::{Side, SideId},
};

/// Nominal control tick interval.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// A task scheduled onto the shared event loop before the tick loop starts.
pub type StartupTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy)]
pub struct DoorTiming {
  /// Time one open or close motion takes
  pub transition: Duration,
  /// Time the door stays open before the automatic close begins
  pub keep_open: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CyclePhase {
  Opening,
  Holding,
  Closing,
}

/// A door-open sequence in progress: opening, holding open, closing.
///
/// Its presence doubles as the cycle token that deduplicates overlapping
/// open requests; panels are suspended for exactly as long as one exists.
#[derive(Debug)]
struct OpenCycle {
  phase: CyclePhase,
  expiry: Pin<Box<Sleep>>,
}

impl OpenCycle {
  fn opening(transition: Duration) -> OpenCycle {
    OpenCycle {
      phase: CyclePhase::Opening,
      expiry: Box::pin(time::sleep(transition)),
    }
  }

  fn advance_to(&mut self, phase: CyclePhase, duration: Duration) {
    self.phase = phase;
    self.expiry = Box::pin(time::sleep(duration));
  }

  fn expiry_mut(&mut self) -> &mut Pin<Box<Sleep>> {
    &mut self.expiry
  }
}

/// Owns the door and both sides and runs the control loop.
pub struct Coordinator {
  door: Box<dyn DoorActuator>,
  timing: DoorTiming,
  left: Side,
  right: Side,
  open_requests: UnboundedReceiver<SideId>,
  request_channel: UnboundedSender<SideId>,
  cycle: Option<OpenCycle>,
  terminate: Arc<AtomicBool>,
}

impl Coordinator {
  pub async fn with_config(
    mut config: Config,
    resolver: &dyn Resolve,
    mqtt_tx: PublishSender,
    mqtt_rx: &mut MqttReceiver,
  ) -> AirlockResult<Coordinator> {
    // every device reference is resolved before any device is constructed
    pns::resolve_devices(&mut config, resolver)?;

    let door = GpioDoorDrive::with_handle(&config.door.device)?;
    let timing = DoorTiming {
      transition: config.door.transition_duration,
      keep_open: config.door.keep_open_duration,
    };

    let left = Side::with_config(SideId::Left, &config.left, mqtt_tx.clone(), mqtt_rx).await?;
    let right = Side::with_config(SideId::Right, &config.right, mqtt_tx, mqtt_rx).await?;

    Ok(Coordinator::new(Box::new(door), timing, left, right))
  }

  pub fn new(door: Box<dyn DoorActuator>, timing: DoorTiming, left: Side, right: Side) -> Coordinator {
    let (request_channel, open_requests) = mpsc::unbounded_channel();

    Coordinator {
      door,
      timing,
      left,
      right,
      open_requests,
      request_channel,
      cycle: None,
      terminate: Arc::new(AtomicBool::new(false)),
    }
  }

  /// The flag that ends the run loop. Nothing in the coordinator itself sets
  /// it; termination always comes from outside, e.g. a signal task.
  pub fn termination_flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.terminate)
  }

  /// The channel open requests arrive on.
  pub fn request_channel(&self) -> UnboundedSender<SideId> {
    self.request_channel.clone()
  }

  /// Run the airlock: calibrate the door, schedule both sides' interactive
  /// execution and any extra startup tasks onto the shared event loop, then
  /// tick until the termination flag is set.
  pub async fn run(mut self, extra_tasks: Vec<StartupTask>) -> AirlockResult<()> {
    self.calibrate().await;

    for side in [&mut self.left, &mut self.right] {
      if let Some(press) = side.take_press_stream() {
        tokio::spawn(press_pump(side.id(), press, self.request_channel.clone()));
      }
    }
    for task in extra_tasks {
      tokio::spawn(task);
    }

    log::info!("airlock ready");
    self.tick_loop().await;
    log::info!("airlock terminated");
    Ok(())
  }

  /// Startup self test: one full open/close motion, leaving the door in a
  /// known closed position.
  async fn calibrate(&mut self) {
    log::info!("calibrating door");
    self.door.open();
    time::sleep(self.timing.transition).await;
    self.door.close();
    time::sleep(self.timing.transition).await;
  }

  async fn tick_loop(&mut self) {
    let mut ticker = time::interval(TICK_INTERVAL);
    let mut previous_tick = Instant::now();

    loop {
      select! {
        tick = ticker.tick() => {
          if self.terminate.load(Ordering::SeqCst) {
            return;
          }

          let delta = tick.duration_since(previous_tick).as_secs_f64();
          previous_tick = tick;
          self.left.update(delta);
          self.right.update(delta);
        }

        Some(side) = self.open_requests.recv() => {
          self.request_open(side);
        }

        Some(()) = async {
          if let Some(cycle) = self.cycle.as_mut() {
            cycle.expiry_mut().await;
            Some(())
          }
          else {
            None
          }
        } => {
          self.advance_cycle();
        }
      }
    }
  }

  /// A button press on either side.
  ///
  /// Ignored while a cycle is already in progress: a press and the suspend
  /// propagation are not atomic, so the cycle token does the deduplication
  /// rather than the suspended flags.
  fn request_open(&mut self, side: SideId) {
    if self.cycle.is_some() {
      log::debug!("open request from {} side ignored, cycle in progress", side);
      return;
    }

    log::info!("open requested from {} side", side);
    self.left.panel.suspend();
    self.right.panel.suspend();
    self.door.open();
    self.cycle = Some(OpenCycle::opening(self.timing.transition));
  }

  /// The current cycle phase's wait expired.
  fn advance_cycle(&mut self) {
    let Some(cycle) = self.cycle.as_mut() else { return };

    match cycle.phase {
      CyclePhase::Opening => {
        log::debug!("door open, holding for {:?}", self.timing.keep_open);
        cycle.advance_to(CyclePhase::Holding, self.timing.keep_open);
      }
      CyclePhase::Holding => {
        self.door.close();
        cycle.advance_to(CyclePhase::Closing, self.timing.transition);
      }
      CyclePhase::Closing => {
        self.left.panel.resume();
        self.right.panel.resume();
        self.cycle = None;
        log::info!("door cycle complete");
      }
    }
  }
}

/// A side's interactive execution: forward open-button presses from the
/// panel's press topic to the coordinator.
async fn press_pump(side: SideId, mut press: PublishReceiver, requests: UnboundedSender<SideId>) {
  while let Some(publish) = press.recv().await {
    if publish.payload == "open" {
      if requests.send(side).is_err() {
        return;
      }
    }
    else {
      log::debug!("{} side panel sent unknown press payload {:?}", side, publish.payload);
    }
  }
}
