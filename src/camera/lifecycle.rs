//! Bring-up and teardown of a single camera.
//!
//! Open walks the fixed step order and stops at the first failure, leaving
//! `state` at the last step reached. Close attempts every teardown step and
//! collects failures instead of stopping.

use std::path::Path;
use std::sync::Arc;

use crate::camera::backend::CaptureBackend;
use crate::camera::error::{CameraError, Result};
use crate::camera::sensor::{SensorDriver, SensorRegistry};
use crate::camera::types::{
    frame_sources, CameraConfig, CameraId, CameraState, DeviceMode, PipeConfig, PipeId,
    MAX_CHANNELS,
};
use crate::dispatch::{DispatchConfig, DispatchSnapshot, FrameDispatcher};

/// Dump queue depth used for offline devices.
pub const DUMP_DEPTH: u32 = 3;

/// Calibration file name that means "use built-in tuning".
const NULL_CALIBRATION: &str = "null.bin";

/// Failures collected while closing a camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub camera: CameraId,
    pub errors: Vec<CameraError>,
}

impl CloseReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One camera and how far its bring-up got.
pub struct Camera {
    config: CameraConfig,
    state: CameraState,
    dispatcher: Option<FrameDispatcher>,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            state: CameraState::Created,
            dispatcher: None,
        }
    }

    pub fn id(&self) -> CameraId {
        self.config.id
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn owns_pipe(&self, pipe: PipeId) -> bool {
        self.config.pipes.iter().any(|p| p.id == pipe)
    }

    pub fn is_open(&self) -> bool {
        self.state == CameraState::Open
    }

    pub fn dispatch_stats(&self) -> Option<DispatchSnapshot> {
        self.dispatcher.as_ref().map(FrameDispatcher::stats)
    }

    /// Run the full bring-up sequence.
    ///
    /// On failure nothing already done is undone; `state` tells how far the
    /// sequence got.
    pub fn open(
        &mut self,
        backend: &Arc<dyn CaptureBackend>,
        registry: &SensorRegistry,
    ) -> Result<()> {
        let cfg = self.config.clone();
        cfg.validate().map_err(CameraError::Config)?;
        let driver = registry.get(&cfg.sensor.driver)?;
        let main_pipe = cfg.pipes[0].id;
        let dev = cfg.device.id;

        backend.open_sensor_clock(&cfg.sensor.clock)?;
        self.state = CameraState::ClockOpened;
        driver.reset(main_pipe, cfg.reset_gpio())?;

        backend.start_link(&cfg.link)?;
        self.state = CameraState::MipiStarted;

        backend.create_device(&cfg.device)?;
        backend.bind_pipes(dev, &cfg.pipe_ids(), cfg.hdr_mode.channel_mask())?;
        backend.bind_link(dev, cfg.link.rx_dev)?;
        self.state = CameraState::DeviceCreated;

        for pipe in &cfg.pipes {
            self.open_pipe(backend.as_ref(), &*driver, pipe)?;
        }

        if cfg.enable_device {
            if cfg.device.mode == DeviceMode::Offline {
                backend.set_dump(dev, true, DUMP_DEPTH)?;
            }
            backend.enable_device(dev)?;
            self.state = CameraState::DeviceStarted;
        }

        if cfg.register_sensor && cfg.enable_device {
            for pipe in &cfg.pipes {
                backend.stream_on(pipe.id)?;
            }
            self.state = CameraState::SensorStreaming;
        }

        if cfg.forwards_raw() {
            let dispatcher = FrameDispatcher::spawn(
                Arc::clone(backend),
                DispatchConfig::new(main_pipe, cfg.hdr_mode),
            )?;
            self.dispatcher = Some(dispatcher);
            self.state = CameraState::DispatchRunning;
        }

        self.state = CameraState::Open;
        tracing::info!(
            "camera {}: open on device {dev} with {} pipe(s)",
            cfg.id,
            cfg.pipes.len()
        );
        Ok(())
    }

    fn open_pipe(
        &mut self,
        backend: &dyn CaptureBackend,
        driver: &dyn SensorDriver,
        pipe: &PipeConfig,
    ) -> Result<()> {
        let cfg = &self.config;
        let id = pipe.id;

        backend.create_pipe(pipe, cfg.hdr_mode)?;
        self.state = CameraState::PipeCreated;
        for (source, kind) in frame_sources(pipe.work_mode, cfg.vin_mode, cfg.load_raw_node) {
            if let Err(e) = backend.set_frame_source(id, source, kind) {
                tracing::warn!("pipe {id}: frame source {source:?} not set: {e}");
            }
        }

        if cfg.register_sensor {
            driver.init(id)?;
            backend.register_sensor(id, driver.name())?;
            driver.set_bus_info(id, cfg.sensor.bus)?;
            if let Some(addr) = cfg.sensor.slave_addr {
                driver.set_slave_addr(id, addr)?;
            }
            backend.set_sensor_attr(id, cfg.hdr_mode, &cfg.sensor.clock)?;
            self.state = CameraState::SensorRegistered;
        }

        backend.isp_create(id)?;
        if cfg.register_sensor {
            backend.isp_register_3a(id, cfg.algorithms)?;
        }
        if let Some(path) = pipe.calibration.as_deref() {
            load_calibration(backend, pipe, path);
        }
        backend.isp_open(id)?;
        self.state = CameraState::IspInited;

        for channel in &pipe.channels {
            backend.set_channel(id, channel)?;
            if channel.enabled {
                backend.enable_channel(id, channel.index)?;
            }
        }
        self.state = CameraState::ChannelStarted;

        backend.start_pipe(id)?;
        self.state = CameraState::PipeStarted;
        backend.isp_start(id)?;
        self.state = CameraState::IspStarted;
        Ok(())
    }

    /// Tear everything down in reverse order, attempting every step.
    ///
    /// The dispatcher is stopped first so no frames are in flight while
    /// the pipes go away.
    pub fn close(&mut self, backend: &dyn CaptureBackend) -> CloseReport {
        let cfg = &self.config;
        let camera = cfg.id;
        let dev = cfg.device.id;
        let mut errors = Vec::new();
        let mut attempt = |step: &str, result: Result<()>| {
            if let Err(e) = result {
                tracing::warn!("camera {camera}: {step} failed: {e}");
                errors.push(e);
            }
        };

        if let Some(mut dispatcher) = self.dispatcher.take() {
            dispatcher.stop();
        }

        for pipe in &cfg.pipes {
            attempt("isp stop", backend.isp_stop(pipe.id));
        }

        if cfg.enable_device {
            attempt("device disable", backend.disable_device(dev));
            if cfg.device.mode == DeviceMode::Offline {
                attempt("dump off", backend.set_dump(dev, false, 0));
            }
        }

        if cfg.register_sensor && cfg.enable_device {
            for pipe in &cfg.pipes {
                attempt("stream off", backend.stream_off(pipe.id));
            }
        }

        attempt(
            "sensor clock close",
            backend.close_sensor_clock(cfg.sensor.clock.index),
        );

        for pipe in &cfg.pipes {
            let id = pipe.id;
            attempt("pipe stop", backend.stop_pipe(id));
            for index in 0..MAX_CHANNELS as u8 {
                attempt("channel disable", backend.disable_channel(id, index));
            }
            attempt("isp close", backend.isp_close(id));
            if cfg.register_sensor {
                attempt("3a unregister", backend.isp_unregister_3a(id));
            }
            attempt("isp destroy", backend.isp_destroy(id));
            if cfg.register_sensor {
                attempt("sensor unregister", backend.unregister_sensor(id));
            }
            attempt("pipe destroy", backend.destroy_pipe(id));
        }

        attempt("link stop", backend.stop_link(cfg.link.rx_dev));
        attempt("device destroy", backend.destroy_device(dev));

        self.state = CameraState::Closed;
        if errors.is_empty() {
            tracing::info!("camera {camera}: closed");
        }
        CloseReport { camera, errors }
    }
}

/// Load tuning for a pipe. Failure keeps the built-in defaults.
fn load_calibration(backend: &dyn CaptureBackend, pipe: &PipeConfig, path: &Path) {
    if path.file_name().is_some_and(|name| name == NULL_CALIBRATION) {
        tracing::debug!("pipe {}: using built-in tuning", pipe.id);
        return;
    }
    if let Err(e) = backend.isp_load_calibration(pipe.id, path) {
        tracing::warn!(
            "pipe {}: calibration {} not loaded, using defaults: {e}",
            pipe.id,
            path.display()
        );
    }
}
