// Board configuration: file format and persistence.

pub mod store;
pub mod types;

pub use store::{ConfigError, ConfigStore};
pub use types::BoardConfig;
