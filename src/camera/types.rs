use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vin_buffer::{CompressInfo, PixelFormat};

/// Pipes available on the VIN block.
pub const MAX_PIPES: usize = 6;
/// Output channels per pipe.
pub const MAX_CHANNELS: usize = 3;
/// Cameras a single manager will track.
pub const MAX_CAMERAS: usize = 8;

/// Caller-chosen camera identifier, unique within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(pub u32);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISP pipe index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipeId(pub u8);

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of exposures captured per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HdrMode {
    #[default]
    Linear = 1,
    Hdr2x = 2,
    Hdr3x = 3,
    Hdr4x = 4,
}

impl HdrMode {
    pub fn exposures(self) -> usize {
        self as usize
    }

    /// Bitmask of exposure channels a device binds to its pipes.
    pub fn channel_mask(self) -> u8 {
        (1u8 << self.exposures()) - 1
    }
}

/// Top-level source of frames for a camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VinMode {
    #[default]
    Sensor,
    /// Frames are injected from memory instead of a sensor.
    LoadRaw,
    /// Built-in test pattern generator.
    Tpg,
}

/// Pipeline node raw frames are pulled from or injected into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadRawNode {
    #[default]
    None,
    Ife,
    Itp,
    Rgb,
    Yuv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeWorkMode {
    /// Full ISP pipeline.
    #[default]
    Normal,
    /// IFE bypassed, raw and RGB domains skipped.
    SubYuv,
    /// IFE bypassed.
    SubItp,
    /// ISP tuning modules bypassed.
    IspBypass,
}

/// Pipe input stage a frame source is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSourceId {
    Ife = 1,
    Itp = 2,
    Yuv = 3,
}

/// Where a frame source gets its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSourceKind {
    /// Directly from the device.
    Device,
    /// From frames sent by user code.
    User,
}

/// Device dump queue raw frames are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpNode {
    Ife = 0,
}

/// Sensor control bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusType {
    #[default]
    I2c,
    Spi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusType,
    pub number: u8,
}

/// Sensor reference clock output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorClock {
    pub index: u8,
    pub rate_hz: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    /// Name the driver was registered under.
    pub driver: String,
    pub bus: BusConfig,
    #[serde(default)]
    pub slave_addr: Option<u8>,
    pub clock: SensorClock,
    #[serde(default)]
    pub reset_gpio: Option<u32>,
}

/// Clock edge sampling for parallel BT interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BtClockMode {
    #[default]
    Sdr,
    Ddr,
}

/// Physical input interface and its timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Transport {
    Mipi {
        lanes: u8,
        data_rate_mbps: u32,
        #[serde(default)]
        lane_map: Vec<u8>,
    },
    Lvds {
        lanes: u8,
        data_rate_mbps: u32,
    },
    Dvp,
    Bt601 {
        #[serde(default)]
        clock: BtClockMode,
    },
    Bt656 {
        #[serde(default)]
        clock: BtClockMode,
    },
    Bt1120 {
        #[serde(default)]
        clock: BtClockMode,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfig {
    /// Receiver the sensor is wired to.
    pub rx_dev: u8,
    /// PHY lane split between receivers.
    #[serde(default)]
    pub lane_combo: u8,
    pub transport: Transport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    #[default]
    Online,
    /// Frames pass through DDR, which enables the dump queue.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub id: u8,
    #[serde(default)]
    pub mode: DeviceMode,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub index: u8,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    #[serde(default)]
    pub compress: CompressInfo,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeConfig {
    pub id: PipeId,
    #[serde(default)]
    pub work_mode: PipeWorkMode,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    #[serde(default)]
    pub compress: CompressInfo,
    /// ISP tuning binary. `None` or a `null.bin` name keeps built-in tuning.
    #[serde(default)]
    pub calibration: Option<PathBuf>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// 3A algorithm set registered with the ISP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithms {
    #[default]
    Builtin,
    User,
}

/// Everything needed to open one camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    pub id: CameraId,
    #[serde(default)]
    pub hdr_mode: HdrMode,
    #[serde(default)]
    pub vin_mode: VinMode,
    #[serde(default)]
    pub load_raw_node: LoadRawNode,
    #[serde(default = "default_true")]
    pub register_sensor: bool,
    #[serde(default = "default_true")]
    pub enable_device: bool,
    #[serde(default)]
    pub algorithms: Algorithms,
    pub sensor: SensorConfig,
    pub link: LinkConfig,
    pub device: DeviceConfig,
    pub pipes: Vec<PipeConfig>,
}

impl CameraConfig {
    pub fn pipe_ids(&self) -> Vec<PipeId> {
        self.pipes.iter().map(|p| p.id).collect()
    }

    /// Whether a dispatcher forwards device raw frames into the ITP.
    pub fn forwards_raw(&self) -> bool {
        self.enable_device && self.load_raw_node == LoadRawNode::Itp
    }

    /// Reset line for the sensor, defaulting by device slot.
    pub fn reset_gpio(&self) -> u32 {
        self.sensor
            .reset_gpio
            .unwrap_or(if self.device.id == 0 { 97 } else { 40 })
    }

    /// Check limits that the hardware would otherwise reject halfway
    /// through bring-up.
    pub fn validate(&self) -> Result<(), String> {
        if self.pipes.is_empty() {
            return Err(format!("camera {} has no pipes", self.id));
        }
        if self.pipes.len() > MAX_PIPES {
            return Err(format!(
                "camera {} binds {} pipes, limit is {MAX_PIPES}",
                self.id,
                self.pipes.len()
            ));
        }
        for (i, pipe) in self.pipes.iter().enumerate() {
            if usize::from(pipe.id.0) >= MAX_PIPES {
                return Err(format!("camera {}: pipe id {} out of range", self.id, pipe.id));
            }
            if self.pipes[..i].iter().any(|p| p.id == pipe.id) {
                return Err(format!("camera {}: pipe {} listed twice", self.id, pipe.id));
            }
            if let Some(ch) = pipe
                .channels
                .iter()
                .find(|c| usize::from(c.index) >= MAX_CHANNELS)
            {
                return Err(format!(
                    "camera {}: pipe {} channel {} out of range",
                    self.id, pipe.id, ch.index
                ));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_depth() -> u32 {
    3
}

/// Attachments a pipe needs for its work mode.
///
/// Raw forwarding into the ITP feeds from user space while the IFE keeps
/// reading from the device.
pub fn frame_sources(
    work_mode: PipeWorkMode,
    vin_mode: VinMode,
    node: LoadRawNode,
) -> Vec<(FrameSourceId, FrameSourceKind)> {
    use FrameSourceId::*;
    use FrameSourceKind::*;
    let load_raw = vin_mode == VinMode::LoadRaw;
    match work_mode {
        PipeWorkMode::Normal => match (load_raw, node == LoadRawNode::Itp) {
            (true, true) => vec![(Itp, User)],
            (true, false) => vec![(Ife, User)],
            (false, true) => vec![(Itp, User), (Ife, Device)],
            (false, false) => vec![(Ife, Device)],
        },
        PipeWorkMode::SubYuv if load_raw => vec![(Ife, User), (Yuv, User)],
        PipeWorkMode::SubYuv => vec![(Ife, Device), (Yuv, Device)],
        PipeWorkMode::SubItp | PipeWorkMode::IspBypass => Vec::new(),
    }
}

/// Progress of a camera through bring-up, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraState {
    Created,
    ClockOpened,
    MipiStarted,
    DeviceCreated,
    PipeCreated,
    SensorRegistered,
    IspInited,
    ChannelStarted,
    PipeStarted,
    IspStarted,
    DeviceStarted,
    SensorStreaming,
    DispatchRunning,
    Open,
    Closed,
}

/// One exposure of a raw frame held by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub pipe: PipeId,
    pub exposure: u8,
    pub seq: u64,
    pub timestamp_us: u64,
    /// Opaque backend buffer handle.
    pub block: u32,
}

/// One frame per exposure, all with the same sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    frames: Vec<RawFrame>,
}

impl FrameSet {
    /// Build a set from per-exposure frames.
    ///
    /// Hands the frames back if the list is empty or the sequence numbers
    /// differ, so the caller can still release them.
    pub fn aligned(frames: Vec<RawFrame>) -> Result<Self, Vec<RawFrame>> {
        let matched = frames
            .first()
            .is_some_and(|first| frames.iter().all(|f| f.seq == first.seq));
        if matched {
            Ok(Self { frames })
        } else {
            Err(frames)
        }
    }

    pub fn seq(&self) -> u64 {
        self.frames[0].seq
    }

    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }
}

/// A processed frame taken from a pipe's output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YuvFrame {
    pub pipe: PipeId,
    pub channel: u8,
    pub seq: u64,
    pub timestamp_us: u64,
    /// Opaque backend buffer handle.
    pub block: u32,
}

/// How long a raw frame fetch may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWait {
    Forever,
    Millis(u32),
}
