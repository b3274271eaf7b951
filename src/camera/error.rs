use std::fmt;

use thiserror::Error;

use crate::camera::types::{CameraId, CameraState};

/// Hardware block an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Sys,
    Pool,
    Vin,
    Mipi,
    Isp,
    Sensor,
    Dispatch,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::Sys => "sys",
            Module::Pool => "pool",
            Module::Vin => "vin",
            Module::Mipi => "mipi",
            Module::Isp => "isp",
            Module::Sensor => "sensor",
            Module::Dispatch => "dispatch",
        };
        f.write_str(name)
    }
}

/// Camera subsystem errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{module}: resources exhausted")]
    ResourceExhausted { module: Module },

    #[error("{module}: queue empty")]
    QueueEmpty { module: Module },

    #[error("{module}: timed out after {timeout_ms} ms")]
    Timeout { module: Module, timeout_ms: u32 },

    #[error("{module}: {operation} failed with code {code:#x}")]
    Driver {
        module: Module,
        operation: &'static str,
        code: i32,
    },

    #[error("camera {camera} failed to open (reached {reached:?}): {source}")]
    PartialOpen {
        camera: CameraId,
        reached: CameraState,
        source: Box<CameraError>,
    },

    #[error("sensor driver not registered: {0}")]
    SensorNotFound(String),

    #[error("thread error: {0}")]
    Thread(String),

    #[error(transparent)]
    Pool(#[from] vin_buffer::PoolError),
}

impl CameraError {
    /// Shorthand for a pass-through backend failure.
    pub fn driver(module: Module, operation: &'static str, code: i32) -> Self {
        CameraError::Driver {
            module,
            operation,
            code,
        }
    }

    /// True when a frame fetch found nothing to read.
    pub fn is_queue_empty(&self) -> bool {
        matches!(self, CameraError::QueueEmpty { .. })
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
