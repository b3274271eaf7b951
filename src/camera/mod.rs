// Camera domain: capture backend, per-camera lifecycle, and coordination.

pub mod backend;
pub mod capture;
pub mod dummy;
pub mod error;
pub mod lifecycle;
pub mod manager;
#[cfg(test)]
pub mod mock;
pub mod sensor;
pub mod system;
pub mod types;
