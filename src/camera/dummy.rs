use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use vin_buffer::PoolFloorplan;

use crate::camera::backend::CaptureBackend;
use crate::camera::error::{CameraError, Module, Result};
use crate::camera::types::{
    Algorithms, ChannelConfig, DeviceConfig, DumpNode, FetchWait, FrameSet, FrameSourceId,
    FrameSourceKind, HdrMode, LinkConfig, PipeConfig, PipeId, RawFrame, SensorClock, YuvFrame,
};

/// Nominal frame period of the simulated sensor.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Exposure 0 skips a frame every this many frames, so the other exposures
/// fall behind and have to be reconciled.
const DEFAULT_SKEW_EVERY: u64 = 7;

/// A fake capture backend for running without the SoC.
///
/// Accepts every control call and produces HDR raw frames on pipes whose
/// device has been enabled. The long exposure periodically drops a frame
/// to exercise sequence reconciliation.
///
/// Enable via `VINCAM_DUMMY=1` environment variable.
pub struct DummyBackend {
    frame_interval: Duration,
    skew_every: u64,
    state: Mutex<DummyState>,
}

#[derive(Default)]
struct DummyState {
    bound: HashMap<u8, Vec<PipeId>>,
    enabled: HashSet<u8>,
    next_seq: HashMap<(PipeId, u8), u64>,
    next_block: u32,
    in_flight: usize,
    forwarded: u64,
}

impl DummyBackend {
    pub fn new() -> Self {
        Self {
            frame_interval: FRAME_INTERVAL,
            skew_every: DEFAULT_SKEW_EVERY,
            state: Mutex::new(DummyState::default()),
        }
    }

    /// Change the frame period. Zero produces frames as fast as asked.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Drop an exposure-0 frame every `n` frames. Zero disables skew.
    pub fn with_skew_every(mut self, n: u64) -> Self {
        self.skew_every = n;
        self
    }

    /// Whether the dummy backend is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("VINCAM_DUMMY").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Frames handed out and not yet released.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Matched sets accepted through `send_raw_frame`.
    pub fn forwarded(&self) -> u64 {
        self.state.lock().forwarded
    }

    fn trace(&self, what: &str) -> Result<()> {
        tracing::trace!("dummy: {what}");
        Ok(())
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyState {
    fn is_streaming(&self, pipe: PipeId) -> bool {
        self.bound
            .iter()
            .any(|(dev, pipes)| self.enabled.contains(dev) && pipes.contains(&pipe))
    }

    fn next_frame(&mut self, pipe: PipeId, exposure: u8, skew_every: u64) -> RawFrame {
        let next = self.next_seq.entry((pipe, exposure)).or_insert(1);
        let seq = *next;
        *next += 1;
        if exposure == 0 && skew_every > 0 && seq % skew_every == 0 {
            *next += 1;
        }
        self.next_block += 1;
        self.in_flight += 1;
        RawFrame {
            pipe,
            exposure,
            seq,
            timestamp_us: seq * FRAME_INTERVAL.as_micros() as u64,
            block: self.next_block,
        }
    }
}

impl CaptureBackend for DummyBackend {
    fn sys_init(&self) -> Result<()> {
        self.trace("sys init")
    }
    fn sys_deinit(&self) -> Result<()> {
        self.trace("sys deinit")
    }
    fn pool_exit(&self) -> Result<()> {
        self.trace("pool exit")
    }
    fn pool_set_floorplan(&self, plan: &PoolFloorplan) -> Result<()> {
        tracing::debug!(
            "dummy: common floorplan with {} pool(s), {} bytes",
            plan.len(),
            plan.total_bytes()
        );
        Ok(())
    }
    fn pool_init(&self) -> Result<()> {
        self.trace("pool init")
    }

    fn vin_init(&self) -> Result<()> {
        self.trace("vin init")
    }
    fn vin_deinit(&self) -> Result<()> {
        self.trace("vin deinit")
    }
    fn mipi_init(&self) -> Result<()> {
        self.trace("mipi init")
    }
    fn mipi_deinit(&self) -> Result<()> {
        self.trace("mipi deinit")
    }
    fn vin_set_pool_floorplan(&self, plan: &PoolFloorplan) -> Result<()> {
        tracing::debug!("dummy: private floorplan with {} pool(s)", plan.len());
        Ok(())
    }

    fn open_sensor_clock(&self, clock: &SensorClock) -> Result<()> {
        self.trace(&format!("clock {} at {} Hz", clock.index, clock.rate_hz))
    }
    fn close_sensor_clock(&self, index: u8) -> Result<()> {
        self.trace(&format!("clock {index} off"))
    }
    fn start_link(&self, link: &LinkConfig) -> Result<()> {
        self.trace(&format!("rx {} start", link.rx_dev))
    }
    fn stop_link(&self, rx_dev: u8) -> Result<()> {
        self.trace(&format!("rx {rx_dev} stop"))
    }

    fn create_device(&self, device: &DeviceConfig) -> Result<()> {
        self.state.lock().bound.entry(device.id).or_default();
        Ok(())
    }
    fn bind_pipes(&self, device: u8, pipes: &[PipeId], _channel_mask: u8) -> Result<()> {
        self.state.lock().bound.insert(device, pipes.to_vec());
        Ok(())
    }
    fn bind_link(&self, device: u8, rx_dev: u8) -> Result<()> {
        self.trace(&format!("dev {device} on rx {rx_dev}"))
    }
    fn set_dump(&self, device: u8, enabled: bool, depth: u32) -> Result<()> {
        self.trace(&format!("dev {device} dump {enabled} depth {depth}"))
    }
    fn enable_device(&self, device: u8) -> Result<()> {
        self.state.lock().enabled.insert(device);
        Ok(())
    }
    fn disable_device(&self, device: u8) -> Result<()> {
        self.state.lock().enabled.remove(&device);
        Ok(())
    }
    fn destroy_device(&self, device: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.enabled.remove(&device);
        state.bound.remove(&device);
        Ok(())
    }

    fn create_pipe(&self, pipe: &PipeConfig, hdr: HdrMode) -> Result<()> {
        self.trace(&format!("pipe {} {}x{} {hdr:?}", pipe.id, pipe.width, pipe.height))
    }
    fn set_frame_source(
        &self,
        pipe: PipeId,
        id: FrameSourceId,
        kind: FrameSourceKind,
    ) -> Result<()> {
        self.trace(&format!("pipe {pipe} source {id:?} from {kind:?}"))
    }
    fn start_pipe(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("pipe {pipe} start"))
    }
    fn stop_pipe(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("pipe {pipe} stop"))
    }
    fn destroy_pipe(&self, pipe: PipeId) -> Result<()> {
        self.state.lock().next_seq.retain(|(p, _), _| *p != pipe);
        Ok(())
    }

    fn register_sensor(&self, pipe: PipeId, driver: &str) -> Result<()> {
        self.trace(&format!("pipe {pipe} sensor {driver}"))
    }
    fn set_sensor_attr(&self, pipe: PipeId, hdr: HdrMode, _clock: &SensorClock) -> Result<()> {
        self.trace(&format!("pipe {pipe} sensor {hdr:?}"))
    }
    fn unregister_sensor(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("pipe {pipe} sensor gone"))
    }
    fn stream_on(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("pipe {pipe} stream on"))
    }
    fn stream_off(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("pipe {pipe} stream off"))
    }

    fn isp_create(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} create"))
    }
    fn isp_register_3a(&self, pipe: PipeId, algorithms: Algorithms) -> Result<()> {
        self.trace(&format!("isp {pipe} 3a {algorithms:?}"))
    }
    fn isp_unregister_3a(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} 3a off"))
    }
    fn isp_load_calibration(&self, pipe: PipeId, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(CameraError::driver(Module::Isp, "load_calibration", -2));
        }
        self.trace(&format!("isp {pipe} calibration {}", path.display()))
    }
    fn isp_open(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} open"))
    }
    fn isp_start(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} start"))
    }
    fn isp_stop(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} stop"))
    }
    fn isp_close(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} close"))
    }
    fn isp_destroy(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} destroy"))
    }
    fn isp_lock_3a_from(&self, capture: PipeId, reference: PipeId) -> Result<()> {
        self.trace(&format!("isp {capture} 3a locked to {reference}"))
    }
    fn isp_run_once(&self, pipe: PipeId) -> Result<()> {
        self.trace(&format!("isp {pipe} run once"))
    }

    fn set_channel(&self, pipe: PipeId, channel: &ChannelConfig) -> Result<()> {
        self.trace(&format!(
            "pipe {pipe} chn {} {}x{}",
            channel.index, channel.width, channel.height
        ))
    }
    fn enable_channel(&self, pipe: PipeId, index: u8) -> Result<()> {
        self.trace(&format!("pipe {pipe} chn {index} on"))
    }
    fn disable_channel(&self, pipe: PipeId, index: u8) -> Result<()> {
        self.trace(&format!("pipe {pipe} chn {index} off"))
    }

    /// Hands out the result of the latest accepted set; times out before the first.
    fn get_yuv_frame(&self, pipe: PipeId, channel: u8, timeout_ms: u32) -> Result<YuvFrame> {
        let mut state = self.state.lock();
        if state.forwarded == 0 {
            return Err(CameraError::Timeout {
                module: Module::Vin,
                timeout_ms,
            });
        }
        state.next_block += 1;
        state.in_flight += 1;
        Ok(YuvFrame {
            pipe,
            channel,
            seq: state.forwarded,
            timestamp_us: state.forwarded * FRAME_INTERVAL.as_micros() as u64,
            block: state.next_block,
        })
    }

    fn release_yuv_frame(&self, _pipe: PipeId, _channel: u8, _frame: &YuvFrame) -> Result<()> {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        Ok(())
    }

    fn get_raw_frame(
        &self,
        pipe: PipeId,
        _node: DumpNode,
        exposure: u8,
        wait: FetchWait,
    ) -> Result<RawFrame> {
        if !self.state.lock().is_streaming(pipe) {
            if let FetchWait::Millis(ms) = wait {
                std::thread::sleep(self.frame_interval.min(Duration::from_millis(ms.into())));
            }
            return Err(CameraError::QueueEmpty { module: Module::Vin });
        }
        if exposure == 0 {
            std::thread::sleep(self.frame_interval);
        }
        Ok(self.state.lock().next_frame(pipe, exposure, self.skew_every))
    }

    fn release_raw_frame(&self, _pipe: PipeId, _node: DumpNode, _frame: &RawFrame) -> Result<()> {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        Ok(())
    }

    fn send_raw_frame(
        &self,
        pipe: PipeId,
        _source: FrameSourceId,
        _hdr: HdrMode,
        frames: &FrameSet,
        _timeout_ms: u32,
    ) -> Result<()> {
        tracing::trace!("dummy: pipe {pipe} accepted seq {}", frames.seq());
        self.state.lock().forwarded += 1;
        Ok(())
    }
}
