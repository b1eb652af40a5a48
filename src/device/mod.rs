//! Fixtures hold their own capability values and report them to the controller.

use std::collections::BTreeMap;

use crate::controller::ControllerId;

pub mod comscan_led;
pub use self::comscan_led::ComscanLed;

/// Capability -> value preset.
pub type Point = BTreeMap<String, f64>;

/// A buffering mutation request for a fixture.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    /// Set a single capability.
    Value { capability: String, value: f64 },
    /// Apply a named point.
    Point(String),
}

impl Buffer {
    pub fn value<S: Into<String>>(capability: S, value: f64) -> Buffer {
        Buffer::Value {
            capability: capability.into(),
            value,
        }
    }

    pub fn point<S: Into<String>>(name: S) -> Buffer {
        Buffer::Point(name.into())
    }
}

/// What the controller needs from a fixture.
///
/// Fixtures occupy `capabilities().len()` consecutive channels starting at
/// their start address, in capability declaration order.
pub trait Fixture {
    /// 1-based DMX start address, `None` until assigned.
    fn start_address(&self) -> Option<usize>;
    fn set_start_address(&mut self, address: usize);

    /// Capability names in channel order.
    fn capabilities(&self) -> &[String];

    /// Named presets declared by this fixture.
    fn points(&self) -> &BTreeMap<String, Point>;

    fn point(&self, name: &str) -> Option<&Point> {
        self.points().get(name)
    }

    /// Current value of every capability, ordered like `capabilities()`.
    fn current_values(&self) -> Vec<f64>;

    /// Buffer a new value or point. Names the fixture doesn't declare are ignored.
    fn buffer(&mut self, request: &Buffer);

    /// The controller this fixture is attached to.
    fn controller(&self) -> Option<ControllerId>;
    fn set_controller(&mut self, id: ControllerId);
}

/// A generic fixture described entirely by data.
#[derive(Debug, Clone, PartialEq)]
pub struct DmxDevice {
    start_address: Option<usize>,
    capabilities: Vec<String>,
    points: BTreeMap<String, Point>,
    /// Buffered values, one per capability.
    values: Vec<f64>,
    controller: Option<ControllerId>,
}

impl DmxDevice {
    /// Create a device with all capabilities at zero and no start address.
    pub fn new<I, S>(capabilities: I) -> DmxDevice
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capabilities: Vec<String> = capabilities.into_iter().map(Into::into).collect();
        DmxDevice {
            start_address: None,
            values: vec![0.0; capabilities.len()],
            capabilities,
            points: BTreeMap::new(),
            controller: None,
        }
    }

    /// Pin the device to a start address.
    pub fn at(mut self, address: usize) -> DmxDevice {
        self.start_address = Some(address);
        self
    }

    /// Declare a named point.
    pub fn with_point<N, I, S>(mut self, name: N, values: I) -> DmxDevice
    where
        N: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let point = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.points.insert(name.into(), point);
        self
    }

    /// Buffered value of a single capability.
    pub fn value(&self, capability: &str) -> Option<f64> {
        self.index_of(capability).map(|index| self.values[index])
    }

    fn index_of(&self, capability: &str) -> Option<usize> {
        self.capabilities.iter().position(|c| c == capability)
    }

    fn set_value(&mut self, capability: &str, value: f64) {
        if let Some(index) = self.index_of(capability) {
            self.values[index] = value;
        }
    }
}

impl Fixture for DmxDevice {
    fn start_address(&self) -> Option<usize> {
        self.start_address
    }

    fn set_start_address(&mut self, address: usize) {
        self.start_address = Some(address);
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn points(&self) -> &BTreeMap<String, Point> {
        &self.points
    }

    fn current_values(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn buffer(&mut self, request: &Buffer) {
        match request {
            Buffer::Value { capability, value } => self.set_value(capability, *value),
            Buffer::Point(name) => {
                let point = match self.points.get(name) {
                    Some(point) => point.clone(),
                    None => return,
                };
                for (capability, value) in point {
                    self.set_value(&capability, value);
                }
            }
        }
    }

    fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    fn set_controller(&mut self, id: ControllerId) {
        self.controller = Some(id);
    }
}
