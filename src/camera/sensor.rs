//! Sensor driver capability and the registry drivers are looked up in.
//!
//! Drivers are registered by name up front; a camera config refers to one
//! by that name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::{BusConfig, PipeId};

/// Register-level control of one sensor model.
pub trait SensorDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Prepare the driver instance for a pipe before it is bound.
    fn init(&self, _pipe: PipeId) -> Result<()> {
        Ok(())
    }

    /// Pulse the sensor's reset line.
    fn reset(&self, pipe: PipeId, reset_gpio: u32) -> Result<()>;

    /// Point the driver at the control bus the sensor sits on.
    fn set_bus_info(&self, pipe: PipeId, bus: BusConfig) -> Result<()>;

    /// Override the default slave address. Drivers with a fixed address
    /// may ignore this.
    fn set_slave_addr(&self, _pipe: PipeId, _addr: u8) -> Result<()> {
        Ok(())
    }
}

/// Named collection of sensor drivers.
#[derive(Default, Clone)]
pub struct SensorRegistry {
    drivers: HashMap<String, Arc<dyn SensorDriver>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver under its own name, replacing any previous one.
    pub fn register(&mut self, driver: Arc<dyn SensorDriver>) {
        let name = driver.name().to_string();
        if self.drivers.insert(name.clone(), driver).is_some() {
            tracing::debug!("Sensor driver {name} replaced");
        }
    }

    pub fn with(mut self, driver: Arc<dyn SensorDriver>) -> Self {
        self.register(driver);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SensorDriver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| CameraError::SensorNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Driver for sensors that need no bus programming beyond what the
/// backend already does, such as test pattern sources.
pub struct GenericSensor {
    name: String,
}

impl GenericSensor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SensorDriver for GenericSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self, pipe: PipeId, reset_gpio: u32) -> Result<()> {
        tracing::debug!("{}: reset pipe {pipe} via gpio {reset_gpio}", self.name);
        Ok(())
    }

    fn set_bus_info(&self, pipe: PipeId, bus: BusConfig) -> Result<()> {
        tracing::debug!("{}: pipe {pipe} on {:?} bus {}", self.name, bus.kind, bus.number);
        Ok(())
    }
}
