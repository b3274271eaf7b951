//! In-memory capture backend for tests.
//!
//! Uses a builder pattern to script raw frame queues and inject errors.
//! Every call is recorded as `op(args)` so tests can assert ordering.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use vin_buffer::PoolFloorplan;

use crate::camera::backend::CaptureBackend;
use crate::camera::error::{CameraError, Module, Result};
use crate::camera::types::{
    Algorithms, CameraConfig, ChannelConfig, DeviceConfig, DumpNode, FetchWait, FrameSet,
    FrameSourceId, FrameSourceKind, HdrMode, LinkConfig, PipeConfig, PipeId, RawFrame,
    SensorClock, YuvFrame,
};

/// Configurable error injection for an operation.
///
/// `operation` matches either the bare name (`"start_pipe"`) or a call with
/// its arguments (`"start_pipe(1)"`).
#[derive(Debug, Clone)]
struct ErrorInjection {
    operation: String,
    error: CameraError,
    persistent: bool,
}

pub struct MockBackend {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<String>,
    injections: Vec<ErrorInjection>,
    fail_all: Option<CameraError>,
    queues: HashMap<(PipeId, u8), VecDeque<Result<RawFrame>>>,
    held: Vec<RawFrame>,
    released: Vec<RawFrame>,
    sent: Vec<FrameSet>,
    yuv_held: Vec<YuvFrame>,
    yuv_taken: u64,
    next_block: u32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Fail the next matching call once.
    pub fn with_error(self, operation: &str, error: CameraError) -> Self {
        self.push_injection(operation, error, false);
        self
    }

    /// Fail every matching call.
    pub fn with_persistent_error(self, operation: &str, error: CameraError) -> Self {
        self.push_injection(operation, error, true);
        self
    }

    /// Fail every call of every operation.
    pub fn failing_all(self, error: CameraError) -> Self {
        self.state.lock().fail_all = Some(error);
        self
    }

    /// Queue frames with the given sequence numbers for one exposure.
    pub fn with_frames(self, pipe: PipeId, exposure: u8, seqs: &[u64]) -> Self {
        self.push_frames(pipe, exposure, seqs);
        self
    }

    /// Queue a fetch failure for one exposure, after any frames already queued.
    pub fn with_fetch_error(self, pipe: PipeId, exposure: u8, error: CameraError) -> Self {
        self.state
            .lock()
            .queues
            .entry((pipe, exposure))
            .or_default()
            .push_back(Err(error));
        self
    }

    pub fn push_frames(&self, pipe: PipeId, exposure: u8, seqs: &[u64]) {
        let mut state = self.state.lock();
        for &seq in seqs {
            state.next_block += 1;
            let frame = RawFrame {
                pipe,
                exposure,
                seq,
                timestamp_us: seq * 33_333,
                block: state.next_block,
            };
            state
                .queues
                .entry((pipe, exposure))
                .or_default()
                .push_back(Ok(frame));
        }
    }

    fn push_injection(&self, operation: &str, error: CameraError, persistent: bool) {
        self.state.lock().injections.push(ErrorInjection {
            operation: operation.to_string(),
            error,
            persistent,
        });
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Calls whose name starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Position of a call in the log.
    pub fn position(&self, call: &str) -> Option<usize> {
        self.state.lock().calls.iter().position(|c| c == call)
    }

    pub fn sent(&self) -> Vec<FrameSet> {
        self.state.lock().sent.clone()
    }

    pub fn released(&self) -> Vec<RawFrame> {
        self.state.lock().released.clone()
    }

    /// Frames fetched but not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.lock().held.len()
    }

    /// YUV frames taken but not yet released.
    pub fn yuv_outstanding(&self) -> usize {
        self.state.lock().yuv_held.len()
    }

    fn check(&self, operation: &'static str, args: impl std::fmt::Display) -> Result<()> {
        self.state.lock().check(operation, &args.to_string())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    /// Record the call, then return an injected error if one matches.
    fn check(&mut self, operation: &str, args: &str) -> Result<()> {
        let call = format!("{operation}({args})");
        self.calls.push(call.clone());
        if let Some(err) = &self.fail_all {
            return Err(err.clone());
        }
        if let Some(pos) = self
            .injections
            .iter()
            .position(|e| e.operation == operation || e.operation == call)
        {
            if self.injections[pos].persistent {
                return Err(self.injections[pos].error.clone());
            }
            let injection = self.injections.remove(pos);
            return Err(injection.error);
        }
        Ok(())
    }
}

impl CaptureBackend for MockBackend {
    fn sys_init(&self) -> Result<()> {
        self.check("sys_init", "")
    }
    fn sys_deinit(&self) -> Result<()> {
        self.check("sys_deinit", "")
    }
    fn pool_exit(&self) -> Result<()> {
        self.check("pool_exit", "")
    }
    fn pool_set_floorplan(&self, plan: &PoolFloorplan) -> Result<()> {
        self.check("pool_set_floorplan", plan.len())
    }
    fn pool_init(&self) -> Result<()> {
        self.check("pool_init", "")
    }

    fn vin_init(&self) -> Result<()> {
        self.check("vin_init", "")
    }
    fn vin_deinit(&self) -> Result<()> {
        self.check("vin_deinit", "")
    }
    fn mipi_init(&self) -> Result<()> {
        self.check("mipi_init", "")
    }
    fn mipi_deinit(&self) -> Result<()> {
        self.check("mipi_deinit", "")
    }
    fn vin_set_pool_floorplan(&self, plan: &PoolFloorplan) -> Result<()> {
        self.check("vin_set_pool_floorplan", plan.len())
    }

    fn open_sensor_clock(&self, clock: &SensorClock) -> Result<()> {
        self.check("open_sensor_clock", clock.index)
    }
    fn close_sensor_clock(&self, index: u8) -> Result<()> {
        self.check("close_sensor_clock", index)
    }
    fn start_link(&self, link: &LinkConfig) -> Result<()> {
        self.check("start_link", link.rx_dev)
    }
    fn stop_link(&self, rx_dev: u8) -> Result<()> {
        self.check("stop_link", rx_dev)
    }

    fn create_device(&self, device: &DeviceConfig) -> Result<()> {
        self.check("create_device", device.id)
    }
    fn bind_pipes(&self, device: u8, pipes: &[PipeId], channel_mask: u8) -> Result<()> {
        let ids: Vec<String> = pipes.iter().map(ToString::to_string).collect();
        self.check(
            "bind_pipes",
            format!("{device}:{}:{channel_mask:#b}", ids.join(",")),
        )
    }
    fn bind_link(&self, device: u8, rx_dev: u8) -> Result<()> {
        self.check("bind_link", format!("{device}:{rx_dev}"))
    }
    fn set_dump(&self, device: u8, enabled: bool, _depth: u32) -> Result<()> {
        self.check("set_dump", format!("{device}:{enabled}"))
    }
    fn enable_device(&self, device: u8) -> Result<()> {
        self.check("enable_device", device)
    }
    fn disable_device(&self, device: u8) -> Result<()> {
        self.check("disable_device", device)
    }
    fn destroy_device(&self, device: u8) -> Result<()> {
        self.check("destroy_device", device)
    }

    fn create_pipe(&self, pipe: &PipeConfig, _hdr: HdrMode) -> Result<()> {
        self.check("create_pipe", pipe.id)
    }
    fn set_frame_source(
        &self,
        pipe: PipeId,
        id: FrameSourceId,
        kind: FrameSourceKind,
    ) -> Result<()> {
        self.check("set_frame_source", format!("{pipe}:{id:?}:{kind:?}"))
    }
    fn start_pipe(&self, pipe: PipeId) -> Result<()> {
        self.check("start_pipe", pipe)
    }
    fn stop_pipe(&self, pipe: PipeId) -> Result<()> {
        self.check("stop_pipe", pipe)
    }
    fn destroy_pipe(&self, pipe: PipeId) -> Result<()> {
        self.check("destroy_pipe", pipe)
    }

    fn register_sensor(&self, pipe: PipeId, driver: &str) -> Result<()> {
        self.check("register_sensor", format!("{pipe}:{driver}"))
    }
    fn set_sensor_attr(&self, pipe: PipeId, _hdr: HdrMode, _clock: &SensorClock) -> Result<()> {
        self.check("set_sensor_attr", pipe)
    }
    fn unregister_sensor(&self, pipe: PipeId) -> Result<()> {
        self.check("unregister_sensor", pipe)
    }
    fn stream_on(&self, pipe: PipeId) -> Result<()> {
        self.check("stream_on", pipe)
    }
    fn stream_off(&self, pipe: PipeId) -> Result<()> {
        self.check("stream_off", pipe)
    }

    fn isp_create(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_create", pipe)
    }
    fn isp_register_3a(&self, pipe: PipeId, algorithms: Algorithms) -> Result<()> {
        self.check("isp_register_3a", format!("{pipe}:{algorithms:?}"))
    }
    fn isp_unregister_3a(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_unregister_3a", pipe)
    }
    fn isp_load_calibration(&self, pipe: PipeId, path: &Path) -> Result<()> {
        self.check("isp_load_calibration", format!("{pipe}:{}", path.display()))
    }
    fn isp_open(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_open", pipe)
    }
    fn isp_start(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_start", pipe)
    }
    fn isp_stop(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_stop", pipe)
    }
    fn isp_close(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_close", pipe)
    }
    fn isp_destroy(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_destroy", pipe)
    }
    fn isp_lock_3a_from(&self, capture: PipeId, reference: PipeId) -> Result<()> {
        self.check("isp_lock_3a_from", format!("{capture}:{reference}"))
    }
    fn isp_run_once(&self, pipe: PipeId) -> Result<()> {
        self.check("isp_run_once", pipe)
    }

    fn set_channel(&self, pipe: PipeId, channel: &ChannelConfig) -> Result<()> {
        self.check("set_channel", format!("{pipe}:{}", channel.index))
    }
    fn enable_channel(&self, pipe: PipeId, index: u8) -> Result<()> {
        self.check("enable_channel", format!("{pipe}:{index}"))
    }
    fn disable_channel(&self, pipe: PipeId, index: u8) -> Result<()> {
        self.check("disable_channel", format!("{pipe}:{index}"))
    }

    /// Frames are numbered from 1 in the order they are taken.
    fn get_yuv_frame(&self, pipe: PipeId, channel: u8, _timeout_ms: u32) -> Result<YuvFrame> {
        let mut state = self.state.lock();
        state.check("get_yuv_frame", &format!("{pipe}:{channel}"))?;
        state.yuv_taken += 1;
        state.next_block += 1;
        let frame = YuvFrame {
            pipe,
            channel,
            seq: state.yuv_taken,
            timestamp_us: state.yuv_taken * 33_333,
            block: state.next_block,
        };
        state.yuv_held.push(frame.clone());
        Ok(frame)
    }

    fn release_yuv_frame(&self, pipe: PipeId, channel: u8, frame: &YuvFrame) -> Result<()> {
        let mut state = self.state.lock();
        state.check("release_yuv_frame", &format!("{pipe}:{channel}:{}", frame.seq))?;
        state.yuv_held.retain(|f| f.block != frame.block);
        Ok(())
    }

    /// Never blocks: an empty queue reports `QueueEmpty` for any wait.
    fn get_raw_frame(
        &self,
        pipe: PipeId,
        _node: DumpNode,
        exposure: u8,
        wait: FetchWait,
    ) -> Result<RawFrame> {
        let next = {
            let mut state = self.state.lock();
            state.check("get_raw_frame", &format!("{pipe}:{exposure}"))?;
            let next = state
                .queues
                .get_mut(&(pipe, exposure))
                .and_then(VecDeque::pop_front);
            if let Some(Ok(frame)) = &next {
                state.held.push(frame.clone());
            }
            next
        };
        match next {
            Some(result) => result,
            None => {
                if let FetchWait::Millis(ms) = wait {
                    std::thread::sleep(Duration::from_millis(u64::from(ms.min(1))));
                }
                Err(CameraError::QueueEmpty { module: Module::Vin })
            }
        }
    }

    fn release_raw_frame(&self, pipe: PipeId, _node: DumpNode, frame: &RawFrame) -> Result<()> {
        let mut state = self.state.lock();
        state.check("release_raw_frame", &format!("{pipe}:{}", frame.exposure))?;
        if let Some(pos) = state.held.iter().position(|f| f.block == frame.block) {
            state.held.remove(pos);
        }
        state.released.push(frame.clone());
        Ok(())
    }

    fn send_raw_frame(
        &self,
        pipe: PipeId,
        source: FrameSourceId,
        _hdr: HdrMode,
        frames: &FrameSet,
        _timeout_ms: u32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check("send_raw_frame", &format!("{pipe}:{source:?}"))?;
        state.sent.push(frames.clone());
        Ok(())
    }
}

/// A two-exposure raw-forwarding camera on device `id`, pipe `id`.
pub fn sample_config(id: u32) -> CameraConfig {
    let json = format!(
        r#"{{
            "id": {id},
            "hdrMode": "hdr2x",
            "loadRawNode": "itp",
            "sensor": {{
                "driver": "os04a10",
                "bus": {{ "number": {id} }},
                "clock": {{ "index": {id}, "rateHz": 24000000 }}
            }},
            "link": {{
                "rxDev": {id},
                "transport": {{ "kind": "mipi", "lanes": 4, "dataRateMbps": 1440 }}
            }},
            "device": {{ "id": {id}, "mode": "offline", "width": 2688, "height": 1520, "format": "bayer_raw10" }},
            "pipes": [{{
                "id": {id},
                "width": 2688,
                "height": 1520,
                "format": "bayer_raw10",
                "channels": [{{ "index": 0, "width": 2688, "height": 1520, "format": "yuv420_semiplanar" }}]
            }}]
        }}"#
    );
    serde_json::from_str(&json).unwrap()
}
