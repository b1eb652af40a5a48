//! Comscan LED moving-mirror scanner.

use std::collections::BTreeMap;

use super::{Buffer, DmxDevice, Fixture, Point};
use crate::controller::ControllerId;

/// Channel layout of the scanner in its 5-channel mode.
const CAPABILITIES: [&str; 5] = ["pan", "tilt", "strobe", "gobo", "dimmer"];

/// Gobo wheel slots.
const GOBO_WHEEL: [(&str, f64); 5] = [
    ("open", 0.0),
    ("red", 15.0),
    ("yellow", 30.0),
    ("green", 45.0),
    ("blue", 60.0),
];

/// The Comscan scanner is a fixed-layout device with gobo wheel points.
#[derive(Debug, Clone, PartialEq)]
pub struct ComscanLed {
    device: DmxDevice,
}

impl ComscanLed {
    pub fn new() -> ComscanLed {
        let mut device = DmxDevice::new(CAPABILITIES.iter().copied())
            .with_point("center", vec![("pan", 127.0), ("tilt", 127.0)]);
        for (name, slot) in GOBO_WHEEL.iter() {
            device = device.with_point(*name, vec![("gobo", *slot)]);
        }
        ComscanLed { device }
    }

    pub fn at(address: usize) -> ComscanLed {
        let mut led = ComscanLed::new();
        led.set_start_address(address);
        led
    }
}

impl Default for ComscanLed {
    fn default() -> Self {
        ComscanLed::new()
    }
}

impl Fixture for ComscanLed {
    fn start_address(&self) -> Option<usize> {
        self.device.start_address()
    }

    fn set_start_address(&mut self, address: usize) {
        self.device.set_start_address(address)
    }

    fn capabilities(&self) -> &[String] {
        self.device.capabilities()
    }

    fn points(&self) -> &BTreeMap<String, Point> {
        self.device.points()
    }

    fn current_values(&self) -> Vec<f64> {
        self.device.current_values()
    }

    fn buffer(&mut self, request: &Buffer) {
        self.device.buffer(request)
    }

    fn controller(&self) -> Option<ControllerId> {
        self.device.controller()
    }

    fn set_controller(&mut self, id: ControllerId) {
        self.device.set_controller(id)
    }
}
