use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::device::{ComscanLed, DmxDevice, Fixture, Point};
use crate::error::{Error, Result};

/// Command used to reach the bus when none is configured.
pub const DEFAULT_CMD: &str = "ola_streaming_client -u {universe}";

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    /// Controller configuration.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Fixture patch, in attach order.
    #[serde(default)]
    pub fixtures: Vec<FixtureConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Animation frame rate.
    pub fps: f64,
    /// DMX universe the bus process streams to.
    pub universe: u16,
    /// Bus process command line. `{universe}` is substituted.
    pub cmd: Option<String>,
    /// Capture frames in memory and skip the delay between animation ticks.
    pub test: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            fps: 40.0,
            universe: 1,
            cmd: None,
            test: false,
        }
    }
}

impl ControllerConfig {
    /// Default settings in test mode.
    pub fn for_tests() -> ControllerConfig {
        ControllerConfig {
            test: true,
            ..ControllerConfig::default()
        }
    }

    /// The bus process command line with the universe filled in.
    pub fn command(&self) -> String {
        self.cmd
            .as_deref()
            .unwrap_or(DEFAULT_CMD)
            .replace("{universe}", &self.universe.to_string())
    }
}

/// Fixture patch entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FixtureConfig {
    #[serde(rename_all = "camelCase")]
    Generic {
        /// DMX start address. Assigned after the previous fixtures when missing.
        start_address: Option<usize>,
        /// Capability names in channel order.
        capabilities: Vec<String>,
        /// Named presets.
        #[serde(default)]
        points: BTreeMap<String, Point>,
    },
    #[serde(rename_all = "camelCase")]
    ComscanLed { start_address: Option<usize> },
}

impl FixtureConfig {
    fn start_address(&self) -> Option<usize> {
        match self {
            FixtureConfig::Generic { start_address, .. } => *start_address,
            FixtureConfig::ComscanLed { start_address } => *start_address,
        }
    }

    /// Instantiate the fixture.
    pub fn build(&self) -> Box<dyn Fixture> {
        let mut fixture: Box<dyn Fixture> = match self {
            FixtureConfig::Generic {
                capabilities,
                points,
                ..
            } => {
                let mut device = DmxDevice::new(capabilities.iter().cloned());
                for (name, point) in points {
                    device = device.with_point(name.clone(), point.clone());
                }
                Box::new(device)
            }
            FixtureConfig::ComscanLed { .. } => Box::new(ComscanLed::new()),
        };
        if let Some(address) = self.start_address() {
            fixture.set_start_address(address);
        }
        fixture
    }
}

pub fn read_config_yaml<T: AsRef<Path>>(path: T) -> Result<Root> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let root: Root = serde_yaml::from_reader(reader).map_err(|err| {
        error!("Error reading config file: {}", err);
        err
    })?;
    validate(&root)?;
    Ok(root)
}

pub fn read_config_json<T: AsRef<Path>>(path: T) -> Result<Root> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let root: Root = serde_json::from_reader(reader).map_err(|err| {
        error!("Error reading config file: {}", err);
        err
    })?;
    validate(&root)?;
    Ok(root)
}

/// Quick sanity check for the configuration.
pub fn validate(root: &Root) -> Result<()> {
    if !(root.controller.fps > 0.0) {
        return Err(Error::Config(format!(
            "fps must be positive, got {}",
            root.controller.fps
        )));
    }

    for (index, fixture) in root.fixtures.iter().enumerate() {
        if fixture.start_address() == Some(0) {
            return Err(Error::Config(format!(
                "fixture {} has start address 0, addresses start at 1",
                index
            )));
        }
        if let FixtureConfig::Generic {
            capabilities,
            points,
            ..
        } = fixture
        {
            if capabilities.is_empty() {
                return Err(Error::Config(format!(
                    "fixture {} declares no capabilities",
                    index
                )));
            }
            for (name, point) in points {
                // Points may only refer to capabilities of their own fixture.
                if let Some(unknown) = point.keys().find(|c| !capabilities.contains(c)) {
                    return Err(Error::Config(format!(
                        "point {} of fixture {} refers to unknown capability: {}",
                        name, index, unknown
                    )));
                }
            }
        }
    }

    Ok(())
}
