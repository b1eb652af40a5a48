//! Aggregates DMX fixtures on one universe into frames and streams them to
//! an external bus process such as `ola_streaming_client`.
//!
//! ```no_run
//! use dmx_controller::{Controller, ControllerConfig, DmxDevice};
//!
//! # fn main() -> dmx_controller::Result<()> {
//! let mut controller = Controller::new(ControllerConfig::default());
//! controller.attach(DmxDevice::new(vec!["pan", "tilt", "dimmer"]));
//! controller.attach(DmxDevice::new(vec!["pan", "tilt", "dimmer"]));
//!
//! controller.call("dimmer!", Some(255.0))?;
//! controller.animate_command(2.0, "pan", Some(127.0))?;
//! controller.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod host;
pub mod parser;

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerId};
pub use device::{Buffer, ComscanLed, DmxDevice, Fixture};
pub use error::{Error, Result};
