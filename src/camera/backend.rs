use std::path::Path;

use vin_buffer::PoolFloorplan;

use crate::camera::error::Result;
use crate::camera::types::{
    Algorithms, ChannelConfig, DeviceConfig, DumpNode, FetchWait, FrameSet, FrameSourceId,
    FrameSourceKind, HdrMode, LinkConfig, PipeConfig, PipeId, RawFrame, SensorClock, YuvFrame,
};

/// Capture hardware as seen by the camera lifecycle.
///
/// Implemented over the vendor SDK on target, and by in-memory backends for
/// tests and simulation. Every call is individually blocking and must be
/// safe to issue from any thread.
pub trait CaptureBackend: Send + Sync {
    // System and memory

    fn sys_init(&self) -> Result<()>;
    fn sys_deinit(&self) -> Result<()>;
    /// Release any pools left over from a previous run.
    fn pool_exit(&self) -> Result<()>;
    fn pool_set_floorplan(&self, plan: &PoolFloorplan) -> Result<()>;
    fn pool_init(&self) -> Result<()>;

    // VIN engine

    fn vin_init(&self) -> Result<()>;
    fn vin_deinit(&self) -> Result<()>;
    fn mipi_init(&self) -> Result<()>;
    fn mipi_deinit(&self) -> Result<()>;
    /// Pools private to the VIN block, separate from the common floorplan.
    fn vin_set_pool_floorplan(&self, plan: &PoolFloorplan) -> Result<()>;

    // Sensor clock and physical link

    fn open_sensor_clock(&self, clock: &SensorClock) -> Result<()>;
    fn close_sensor_clock(&self, index: u8) -> Result<()>;
    /// Configure lanes and timing for the receiver, then start it.
    fn start_link(&self, link: &LinkConfig) -> Result<()>;
    fn stop_link(&self, rx_dev: u8) -> Result<()>;

    // Device

    fn create_device(&self, device: &DeviceConfig) -> Result<()>;
    /// `channel_mask` selects the exposure channels the pipes receive.
    fn bind_pipes(&self, device: u8, pipes: &[PipeId], channel_mask: u8) -> Result<()>;
    fn bind_link(&self, device: u8, rx_dev: u8) -> Result<()>;
    /// Enable or disable the device's raw dump queue.
    fn set_dump(&self, device: u8, enabled: bool, depth: u32) -> Result<()>;
    fn enable_device(&self, device: u8) -> Result<()>;
    fn disable_device(&self, device: u8) -> Result<()>;
    fn destroy_device(&self, device: u8) -> Result<()>;

    // Pipe

    fn create_pipe(&self, pipe: &PipeConfig, hdr: HdrMode) -> Result<()>;
    fn set_frame_source(&self, pipe: PipeId, id: FrameSourceId, kind: FrameSourceKind)
        -> Result<()>;
    fn start_pipe(&self, pipe: PipeId) -> Result<()>;
    fn stop_pipe(&self, pipe: PipeId) -> Result<()>;
    fn destroy_pipe(&self, pipe: PipeId) -> Result<()>;

    // Sensor binding

    fn register_sensor(&self, pipe: PipeId, driver: &str) -> Result<()>;
    fn set_sensor_attr(&self, pipe: PipeId, hdr: HdrMode, clock: &SensorClock) -> Result<()>;
    fn unregister_sensor(&self, pipe: PipeId) -> Result<()>;
    fn stream_on(&self, pipe: PipeId) -> Result<()>;
    fn stream_off(&self, pipe: PipeId) -> Result<()>;

    // ISP

    fn isp_create(&self, pipe: PipeId) -> Result<()>;
    fn isp_register_3a(&self, pipe: PipeId, algorithms: Algorithms) -> Result<()>;
    fn isp_unregister_3a(&self, pipe: PipeId) -> Result<()>;
    fn isp_load_calibration(&self, pipe: PipeId, path: &Path) -> Result<()>;
    fn isp_open(&self, pipe: PipeId) -> Result<()>;
    fn isp_start(&self, pipe: PipeId) -> Result<()>;
    fn isp_stop(&self, pipe: PipeId) -> Result<()>;
    fn isp_close(&self, pipe: PipeId) -> Result<()>;
    fn isp_destroy(&self, pipe: PipeId) -> Result<()>;
    /// Copy the AE and AWB parameters of `reference` onto `capture` with
    /// both algorithms switched to manual.
    fn isp_lock_3a_from(&self, capture: PipeId, reference: PipeId) -> Result<()>;
    /// Let the ISP process exactly one injected frame.
    fn isp_run_once(&self, pipe: PipeId) -> Result<()>;

    // Output channels

    fn set_channel(&self, pipe: PipeId, channel: &ChannelConfig) -> Result<()>;
    fn enable_channel(&self, pipe: PipeId, index: u8) -> Result<()>;
    fn disable_channel(&self, pipe: PipeId, index: u8) -> Result<()>;
    fn get_yuv_frame(&self, pipe: PipeId, channel: u8, timeout_ms: u32) -> Result<YuvFrame>;
    fn release_yuv_frame(&self, pipe: PipeId, channel: u8, frame: &YuvFrame) -> Result<()>;

    // Raw frames

    /// Take the next frame of one exposure from a dump queue.
    ///
    /// Fails with `QueueEmpty` when nothing is queued and `Timeout` when a
    /// bounded wait expires.
    fn get_raw_frame(
        &self,
        pipe: PipeId,
        node: DumpNode,
        exposure: u8,
        wait: FetchWait,
    ) -> Result<RawFrame>;

    fn release_raw_frame(&self, pipe: PipeId, node: DumpNode, frame: &RawFrame) -> Result<()>;

    /// Inject a matched exposure set into a pipe's frame source.
    fn send_raw_frame(
        &self,
        pipe: PipeId,
        source: FrameSourceId,
        hdr: HdrMode,
        frames: &FrameSet,
        timeout_ms: u32,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::error::CameraError;
    use crate::camera::mock::MockBackend;

    #[test]
    fn trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn CaptureBackend>>();
        assert_send_sync::<std::sync::Arc<dyn CaptureBackend>>();
    }

    #[test]
    fn mock_backend_fetch_from_empty_queue_reports_empty() {
        let backend = MockBackend::new();
        let err = backend
            .get_raw_frame(PipeId(0), DumpNode::Ife, 0, FetchWait::Millis(0))
            .unwrap_err();
        assert!(err.is_queue_empty());
    }

    #[test]
    fn mock_backend_injected_error_fires_once() {
        let backend = MockBackend::new().with_error(
            "start_pipe",
            CameraError::driver(crate::camera::error::Module::Vin, "start_pipe", -1),
        );
        assert!(backend.start_pipe(PipeId(0)).is_err());
        assert!(backend.start_pipe(PipeId(0)).is_ok());
    }
}
