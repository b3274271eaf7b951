//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use vin_buffer::{calc_pool_floorplan, CompressInfo, ImageSpec, PixelFormat, PoolFloorplan};

use crate::camera::backend::CaptureBackend;
use crate::camera::dummy::DummyBackend;
use crate::camera::manager::CameraManager;
use crate::camera::sensor::{GenericSensor, SensorRegistry};
use crate::camera::system::{deinit_system, init_private_pool, init_system};
use crate::camera::types::CameraId;
use crate::config::{BoardConfig, ConfigStore};
use crate::dispatch::DispatchSnapshot;

/// Camera pipeline bring-up and HDR raw frame dispatch.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log level; overrides RUST_LOG when given
    #[arg(long, env = "VINCAM_LOG", global = true, value_parser = parse_level)]
    pub log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the buffer size for one image
    Size {
        #[arg(long)]
        height: u32,
        /// Stride in pixels
        #[arg(long)]
        stride: u32,
        /// Pixel format, e.g. yuv420_semiplanar or bayer_raw12
        #[arg(long, value_parser = parse_format)]
        format: PixelFormat,
        #[arg(long, value_enum, default_value = "none")]
        compress: CompressArg,
        /// Lossy compression level
        #[arg(long, default_value_t = 0)]
        level: u32,
        /// Row alignment in bytes; 0 selects the default
        #[arg(long, default_value_t = 0)]
        align: u32,
    },
    /// Print the pool floorplans of a board file as JSON
    Plan {
        #[arg(short, long, env = "VINCAM_CONFIG")]
        config: PathBuf,
    },
    /// Open every camera of a board file on the dummy backend
    Simulate {
        #[arg(short, long, env = "VINCAM_CONFIG")]
        config: PathBuf,
        /// How long to let the dispatchers run
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Open every camera of a board file on this target's capture backend
    Run {
        #[arg(short, long, env = "VINCAM_CONFIG")]
        config: PathBuf,
        /// How long to let the dispatchers run
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressArg {
    None,
    Lossless,
    Lossy,
}

impl CompressArg {
    fn info(self, level: u32) -> CompressInfo {
        match self {
            CompressArg::None => CompressInfo::NONE,
            CompressArg::Lossless => CompressInfo::lossless(),
            CompressArg::Lossy => CompressInfo::lossy(level),
        }
    }
}

fn parse_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse().map_err(|_| format!("unknown log level '{s}'"))
}

fn parse_format(s: &str) -> Result<PixelFormat, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown pixel format '{s}'"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPlan {
    pub common: PoolFloorplan,
    pub private: PoolFloorplan,
}

/// Floorplans for the common and VIN-private pools of a board.
pub fn plan_board(board: &BoardConfig) -> Result<BoardPlan, vin_buffer::PoolError> {
    Ok(BoardPlan {
        common: calc_pool_floorplan(&board.pools)?,
        private: calc_pool_floorplan(&board.private_pools)?,
    })
}

/// Pick the capture backend to drive.
///
/// The dummy backend is used when forced or when `VINCAM_DUMMY` is set;
/// no hardware backend is built into this binary.
pub fn capture_backend(force_dummy: bool) -> Result<Arc<dyn CaptureBackend>, String> {
    if force_dummy || DummyBackend::is_enabled() {
        tracing::info!("Using dummy capture backend");
        return Ok(Arc::new(DummyBackend::new()));
    }
    Err("no capture backend on this target; set VINCAM_DUMMY=1 to simulate".to_string())
}

/// Bring the whole board up on `backend`, let it run, then tear it down.
///
/// Returns dispatch statistics for every camera that forwards raw frames.
pub fn simulate(
    backend: Arc<dyn CaptureBackend>,
    board: &BoardConfig,
    duration: Duration,
) -> Result<Vec<(CameraId, DispatchSnapshot)>, Box<dyn std::error::Error>> {
    let plan = plan_board(board)?;
    let mut sensors = SensorRegistry::new();
    for camera in &board.cameras {
        sensors.register(Arc::new(GenericSensor::new(camera.sensor.driver.clone())));
    }
    tracing::debug!("sensor drivers: {}", sensors.names().join(", "));

    init_system(backend.as_ref(), &plan.common)?;
    init_private_pool(backend.as_ref(), &board.private_pools)?;

    let mut manager = CameraManager::new(Arc::clone(&backend), sensors);
    manager.start()?;
    let opened = manager.open_cameras(board.cameras.clone());
    if opened.is_ok() {
        std::thread::sleep(duration);
    }
    let stats: Vec<(CameraId, DispatchSnapshot)> = manager
        .open_ids()
        .into_iter()
        .filter_map(|id| manager.dispatch_stats(id).map(|s| (id, s)))
        .collect();

    for report in manager.shutdown()? {
        for e in &report.errors {
            tracing::warn!("camera {}: {e}", report.camera);
        }
    }
    deinit_system(backend.as_ref())?;
    opened?;
    Ok(stats)
}

/// Execute a parsed command, printing results to stdout.
pub fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Size {
            height,
            stride,
            format,
            compress,
            level,
            align,
        } => {
            let spec = ImageSpec::new(height, stride, format)
                .with_compress(compress.info(level))
                .with_align(align);
            println!("{}", spec.buffer_size());
        }
        Command::Plan { config } => {
            let board = ConfigStore::new(config).load()?;
            let plan = plan_board(&board)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Simulate {
            config,
            duration_ms,
        } => run_board(config, duration_ms, capture_backend(true)?)?,
        Command::Run {
            config,
            duration_ms,
        } => run_board(config, duration_ms, capture_backend(false)?)?,
    }
    Ok(())
}

fn run_board(
    config: PathBuf,
    duration_ms: u64,
    backend: Arc<dyn CaptureBackend>,
) -> Result<(), Box<dyn std::error::Error>> {
    let board = ConfigStore::new(config).load()?;
    let stats = simulate(backend, &board, Duration::from_millis(duration_ms))?;
    let report: Vec<_> = stats
        .iter()
        .map(|(id, snapshot)| json!({ "camera": id, "dispatch": snapshot }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
