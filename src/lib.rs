pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
#[cfg(not(feature = "arm"))]
pub mod mock_gpio;
pub mod mqtt_client;
pub mod options;
pub mod panel;
pub mod pns;
pub mod side;
