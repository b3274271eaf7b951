//! Multi-camera coordination on one VIN engine.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::camera::backend::CaptureBackend;
use crate::camera::capture::capture_still;
use crate::camera::error::{CameraError, Result};
use crate::camera::lifecycle::{Camera, CloseReport};
use crate::camera::sensor::SensorRegistry;
use crate::camera::types::{
    CameraConfig, CameraId, CameraState, FrameSet, PipeId, YuvFrame, MAX_CAMERAS,
};
use crate::dispatch::DispatchSnapshot;

/// Owns every camera opened through one backend.
///
/// A camera whose open failed stays registered in its partial state so it
/// can still be passed to [`CameraManager::close_cameras`].
pub struct CameraManager {
    backend: Arc<dyn CaptureBackend>,
    sensors: SensorRegistry,
    cameras: BTreeMap<CameraId, Camera>,
}

impl CameraManager {
    pub fn new(backend: Arc<dyn CaptureBackend>, sensors: SensorRegistry) -> Self {
        Self {
            backend,
            sensors,
            cameras: BTreeMap::new(),
        }
    }

    /// Bring up the VIN and MIPI engines.
    pub fn start(&self) -> Result<()> {
        self.backend.vin_init()?;
        self.backend.mipi_init()?;
        tracing::debug!("vin engine started");
        Ok(())
    }

    /// Open cameras in order.
    ///
    /// The batch is checked as a whole before any hardware is touched. If
    /// camera `i` fails, cameras `0..i` from this batch are closed again,
    /// later cameras are never attempted and camera `i` is left as it is.
    pub fn open_cameras(&mut self, configs: Vec<CameraConfig>) -> Result<Vec<CameraId>> {
        self.admit(&configs)?;

        let mut opened: Vec<CameraId> = Vec::with_capacity(configs.len());
        for config in configs {
            let id = config.id;
            let mut camera = Camera::new(config);
            let result = camera.open(&self.backend, &self.sensors);
            let reached = camera.state();
            self.cameras.insert(id, camera);

            if let Err(source) = result {
                tracing::error!("camera {id}: open failed at {reached:?}: {source}");
                for report in self.close_cameras(&opened) {
                    if !report.is_clean() {
                        tracing::warn!(
                            "camera {}: rollback left {} error(s)",
                            report.camera,
                            report.errors.len()
                        );
                    }
                }
                return Err(CameraError::PartialOpen {
                    camera: id,
                    reached,
                    source: Box::new(source),
                });
            }
            opened.push(id);
        }
        Ok(opened)
    }

    fn admit(&self, configs: &[CameraConfig]) -> Result<()> {
        let active = self.cameras.values().filter(|c| !is_closed(c)).count();
        if active + configs.len() > MAX_CAMERAS {
            return Err(CameraError::Config(format!(
                "{} camera(s) requested with {active} active, limit is {MAX_CAMERAS}",
                configs.len()
            )));
        }

        let mut seen = HashSet::new();
        for config in configs {
            config
                .validate()
                .map_err(|e| CameraError::Config(format!("camera {}: {e}", config.id)))?;
            let in_use = self.cameras.get(&config.id).is_some_and(|c| !is_closed(c));
            if !seen.insert(config.id) || in_use {
                return Err(CameraError::Config(format!(
                    "camera {} is already in use",
                    config.id
                )));
            }
        }
        Ok(())
    }

    /// Close the given cameras, attempting every teardown step of each.
    ///
    /// Unknown or already closed ids are skipped. Never fails; problems are
    /// in the returned reports.
    pub fn close_cameras(&mut self, ids: &[CameraId]) -> Vec<CloseReport> {
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            match self.cameras.get_mut(id) {
                Some(camera) if !is_closed(camera) => {
                    reports.push(camera.close(self.backend.as_ref()));
                }
                Some(_) => tracing::debug!("camera {id}: already closed"),
                None => tracing::warn!("camera {id}: not known, nothing to close"),
            }
        }
        reports
    }

    pub fn close_all(&mut self) -> Vec<CloseReport> {
        let ids: Vec<CameraId> = self.cameras.keys().copied().collect();
        self.close_cameras(&ids)
    }

    /// Close every camera, then stop the MIPI and VIN engines.
    pub fn shutdown(&mut self) -> Result<Vec<CloseReport>> {
        let reports = self.close_all();
        let mipi = self.backend.mipi_deinit();
        let vin = self.backend.vin_deinit();
        mipi.and(vin)?;
        Ok(reports)
    }

    pub fn state(&self, id: CameraId) -> Option<CameraState> {
        self.cameras.get(&id).map(Camera::state)
    }

    pub fn open_ids(&self) -> Vec<CameraId> {
        self.cameras
            .values()
            .filter(|c| c.is_open())
            .map(Camera::id)
            .collect()
    }

    pub fn dispatch_stats(&self, id: CameraId) -> Option<DispatchSnapshot> {
        self.cameras.get(&id).and_then(Camera::dispatch_stats)
    }

    /// Single-shot capture of `raw` on a pipe of an open camera, with 3A
    /// taken from `reference`. See [`crate::camera::capture::capture_still`].
    pub fn capture_still<T>(
        &self,
        capture: PipeId,
        reference: PipeId,
        raw: &FrameSet,
        use_frame: impl FnOnce(&YuvFrame) -> T,
    ) -> Result<T> {
        let owned = self
            .cameras
            .values()
            .any(|c| c.is_open() && c.owns_pipe(capture));
        if !owned {
            return Err(CameraError::Config(format!(
                "pipe {capture} does not belong to an open camera"
            )));
        }
        capture_still(self.backend.as_ref(), capture, reference, raw, use_frame)
    }
}

fn is_closed(camera: &Camera) -> bool {
    camera.state() == CameraState::Closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::error::Module;
    use crate::camera::mock::{sample_config, MockBackend};
    use crate::camera::sensor::GenericSensor;
    use crate::camera::types::LoadRawNode;

    fn manager(mock: &Arc<MockBackend>) -> CameraManager {
        let sensors = SensorRegistry::new().with(Arc::new(GenericSensor::new("os04a10")));
        CameraManager::new(Arc::clone(mock) as Arc<dyn CaptureBackend>, sensors)
    }

    fn configs(ids: &[u32]) -> Vec<CameraConfig> {
        ids.iter()
            .map(|&id| {
                let mut cfg = sample_config(id);
                cfg.load_raw_node = LoadRawNode::None;
                cfg
            })
            .collect()
    }

    #[test]
    fn opens_all_cameras() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        let ids = manager.open_cameras(configs(&[0, 1])).unwrap();
        assert_eq!(ids, vec![CameraId(0), CameraId(1)]);
        assert_eq!(manager.open_ids(), ids);
    }

    #[test]
    fn failure_rolls_back_earlier_siblings_only() {
        let mock = Arc::new(MockBackend::new().with_error(
            "create_device(1)",
            CameraError::driver(Module::Vin, "create_device", -1),
        ));
        let mut manager = manager(&mock);

        let err = manager.open_cameras(configs(&[0, 1, 2])).unwrap_err();
        match err {
            CameraError::PartialOpen {
                camera, reached, ..
            } => {
                assert_eq!(camera, CameraId(1));
                assert_eq!(reached, CameraState::MipiStarted);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(manager.state(CameraId(0)), Some(CameraState::Closed));
        assert!(mock.position("destroy_device(0)").is_some());
        // The failing camera is not torn down by the rollback.
        assert_eq!(manager.state(CameraId(1)), Some(CameraState::MipiStarted));
        assert!(mock.position("stop_link(1)").is_none());
        // Cameras after the failure are never attempted.
        assert_eq!(manager.state(CameraId(2)), None);
        assert!(mock.position("open_sensor_clock(2)").is_none());
        assert!(manager.open_ids().is_empty());
    }

    #[test]
    fn failed_camera_can_be_closed_and_reopened() {
        let mock = Arc::new(MockBackend::new().with_error(
            "start_pipe",
            CameraError::driver(Module::Vin, "start_pipe", -1),
        ));
        let mut manager = manager(&mock);
        assert!(manager.open_cameras(configs(&[0])).is_err());

        let reports = manager.close_cameras(&[CameraId(0)]);
        assert_eq!(reports.len(), 1);
        assert_eq!(manager.state(CameraId(0)), Some(CameraState::Closed));

        manager.open_cameras(configs(&[0])).unwrap();
        assert_eq!(manager.state(CameraId(0)), Some(CameraState::Open));
    }

    #[test]
    fn duplicate_ids_are_rejected_before_touching_hardware() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        let mut batch = configs(&[0]);
        batch.extend(configs(&[0]));

        let err = manager.open_cameras(batch).unwrap_err();
        assert!(matches!(err, CameraError::Config(_)));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn open_camera_id_cannot_be_reused() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        manager.open_cameras(configs(&[3])).unwrap();
        assert!(matches!(
            manager.open_cameras(configs(&[3])),
            Err(CameraError::Config(_))
        ));
    }

    #[test]
    fn camera_limit_is_enforced() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        let ids: Vec<u32> = (0..=MAX_CAMERAS as u32).collect();
        assert!(matches!(
            manager.open_cameras(configs(&ids)),
            Err(CameraError::Config(_))
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn close_continues_past_failures() {
        let err = CameraError::driver(Module::Vin, "teardown", -1);
        let mock = Arc::new(
            MockBackend::new()
                .with_persistent_error("stop_pipe", err.clone())
                .with_persistent_error("destroy_device", err),
        );
        let mut manager = manager(&mock);
        manager.open_cameras(configs(&[0, 1])).unwrap();

        let reports = manager.close_all();
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert_eq!(report.errors.len(), 2);
        }
        assert!(mock.position("destroy_pipe(0)").is_some());
        assert!(mock.position("destroy_pipe(1)").is_some());
        assert!(mock.position("stop_link(1)").is_some());
        assert!(manager.open_ids().is_empty());
    }

    #[test]
    fn closing_unknown_or_closed_cameras_is_a_no_op() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        manager.open_cameras(configs(&[0])).unwrap();
        assert_eq!(manager.close_cameras(&[CameraId(0)]).len(), 1);
        assert!(manager.close_cameras(&[CameraId(0), CameraId(7)]).is_empty());
    }

    #[test]
    fn raw_forwarding_camera_reports_dispatch_stats() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        manager.open_cameras(vec![sample_config(0)]).unwrap();
        assert!(manager.dispatch_stats(CameraId(0)).is_some());
        manager.close_all();
        assert!(manager.dispatch_stats(CameraId(0)).is_none());
    }

    #[test]
    fn still_capture_needs_an_open_camera() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        let raw = FrameSet::aligned(vec![crate::camera::types::RawFrame {
            pipe: PipeId(0),
            exposure: 0,
            seq: 1,
            timestamp_us: 0,
            block: 1,
        }])
        .unwrap();

        let err = manager
            .capture_still(PipeId(0), PipeId(0), &raw, |_| ())
            .unwrap_err();
        assert!(matches!(err, CameraError::Config(_)));
        assert!(mock.calls().is_empty());

        manager.open_cameras(configs(&[0])).unwrap();
        let seq = manager
            .capture_still(PipeId(0), PipeId(0), &raw, |f| f.seq)
            .unwrap();
        assert_eq!(seq, 2);
        assert_eq!(mock.yuv_outstanding(), 0);
    }

    #[test]
    fn start_and_shutdown_bracket_the_engine() {
        let mock = Arc::new(MockBackend::new());
        let mut manager = manager(&mock);
        manager.start().unwrap();
        manager.open_cameras(configs(&[0])).unwrap();
        manager.shutdown().unwrap();

        let calls = mock.calls();
        assert_eq!(&calls[..2], &["vin_init()", "mipi_init()"]);
        assert_eq!(&calls[calls.len() - 2..], &["mipi_deinit()", "vin_deinit()"]);
    }
}
