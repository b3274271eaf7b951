use serde::{Deserialize, Serialize};
use vin_buffer::PoolSpec;

use crate::camera::types::CameraConfig;

/// Top-level board file: memory pools and the cameras wired to the SoC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Images the common pools must hold.
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    /// Images held in pools private to the VIN block.
    #[serde(default)]
    pub private_pools: Vec<PoolSpec>,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

impl BoardConfig {
    /// Per-camera checks plus the ones that need the whole board: ids,
    /// devices and pipes are each owned by one camera.
    pub fn validate(&self) -> Result<(), String> {
        for (i, camera) in self.cameras.iter().enumerate() {
            camera.validate()?;
            for earlier in &self.cameras[..i] {
                if earlier.id == camera.id {
                    return Err(format!("camera {} listed twice", camera.id));
                }
                if earlier.device.id == camera.device.id {
                    return Err(format!(
                        "cameras {} and {} share device {}",
                        earlier.id, camera.id, camera.device.id
                    ));
                }
                if let Some(pipe) = camera
                    .pipe_ids()
                    .into_iter()
                    .find(|p| earlier.pipe_ids().contains(p))
                {
                    return Err(format!(
                        "cameras {} and {} share pipe {pipe}",
                        earlier.id, camera.id
                    ));
                }
            }
        }
        Ok(())
    }
}
