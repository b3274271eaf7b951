use std::path::PathBuf;

use thiserror::Error;

use crate::config::types::BoardConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid board config: {0}")]
    Invalid(String),
}

/// Board file on disk.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read, parse and validate the board file.
    pub fn load(&self) -> Result<BoardConfig, ConfigError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let board: BoardConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        board.validate().map_err(ConfigError::Invalid)?;
        tracing::debug!(
            "loaded {} with {} camera(s)",
            self.path.display(),
            board.cameras.len()
        );
        Ok(board)
    }
}
