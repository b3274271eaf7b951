//! Buffer sizing and pool floorplans for the VIN capture pipeline.
//!
//! Everything here is pure: no allocation against hardware, no logging.

pub mod format;
pub mod pool;
pub mod size;

pub use format::{CompressInfo, CompressMode, Layout, PixelFormat};
pub use pool::{
    calc_pool_floorplan, CacheMode, PoolConfig, PoolError, PoolFloorplan, PoolSpec,
    MAX_COMM_POOLS,
};
pub use size::{
    decoder_picture_size, image_buffer_size, image_stride_bytes, jpeg_decoder_yuv_size,
    yuv_image_buffer_size, CodecPayload, ImageSpec,
};
