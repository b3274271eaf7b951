pub mod camera;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod logger;

pub use camera::error::{CameraError, Result};
pub use camera::manager::CameraManager;
pub use config::{BoardConfig, ConfigStore};
pub use dispatch::FrameDispatcher;
