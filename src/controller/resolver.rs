//! Resolution table from command names to the fixtures that declare them.

use std::collections::HashMap;

use crate::device::{Buffer, Fixture};
use crate::error::{Error, Result};

/// A resolved command: what to buffer and on which fixtures.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub request: Buffer,
    /// Registry indices of the fixtures to buffer on.
    pub fixtures: Vec<usize>,
}

/// Capability and point names of every attached fixture.
///
/// Updated on every attach, so lookups never have to walk the fixtures.
#[derive(Debug, Default)]
pub struct CommandTable {
    /// Capability names in first-declared order.
    capabilities: Vec<String>,
    /// Point names in first-declared order.
    points: Vec<String>,
    by_capability: HashMap<String, Vec<usize>>,
    by_point: HashMap<String, Vec<usize>>,
}

impl CommandTable {
    pub fn new() -> CommandTable {
        CommandTable::default()
    }

    /// Record the names declared by the fixture at `index`.
    pub fn register(&mut self, index: usize, fixture: &dyn Fixture) {
        for capability in fixture.capabilities() {
            insert(&mut self.by_capability, &mut self.capabilities, capability, index);
        }
        for point in fixture.points().keys() {
            insert(&mut self.by_point, &mut self.points, point, index);
        }
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn points(&self) -> &[String] {
        &self.points
    }

    /// Whether `name` is a known capability or point.
    pub fn contains(&self, name: &str) -> bool {
        self.by_point.contains_key(name) || self.by_capability.contains_key(name)
    }

    /// Resolve a command name. Points shadow capabilities of the same name.
    ///
    /// `value` is required for capabilities and ignored for points.
    pub fn resolve(&self, name: &str, value: Option<f64>) -> Result<Dispatch> {
        if let Some(fixtures) = self.by_point.get(name) {
            return Ok(Dispatch {
                request: Buffer::point(name),
                fixtures: fixtures.clone(),
            });
        }
        match self.by_capability.get(name) {
            Some(fixtures) => {
                let value = value.ok_or_else(|| Error::MissingValue(name.to_string()))?;
                Ok(Dispatch {
                    request: Buffer::value(name, value),
                    fixtures: fixtures.clone(),
                })
            }
            None => Err(Error::UnknownCommand(name.to_string())),
        }
    }
}

fn insert(map: &mut HashMap<String, Vec<usize>>, order: &mut Vec<String>, name: &str, index: usize) {
    let fixtures = map.entry(name.to_string()).or_insert_with(|| {
        order.push(name.to_string());
        Vec::new()
    });
    if !fixtures.contains(&index) {
        fixtures.push(index);
    }
}
