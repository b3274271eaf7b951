//! Frame buffer size and stride calculation.
//!
//! All functions are pure and total. Arithmetic is done in `u64` so large
//! geometries cannot wrap.

use serde::{Deserialize, Serialize};

use crate::format::{CompressInfo, CompressMode, Layout, PixelFormat};

/// Row granularity used when no alignment is requested.
pub const DEFAULT_ALIGN: u64 = 64;

/// Per-line header added by lossless compression of YUV buffers.
const LOSSLESS_YUV_HEADER: u64 = 96;
/// Per-line header added by lossless compression of raw buffers.
const LOSSLESS_RAW_HEADER: u64 = 32;

/// Geometry, format and compression of one frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub height: u32,
    /// Pixels for raw formats, bytes or pixels for YUV depending on the caller.
    pub stride: u32,
    pub format: PixelFormat,
    #[serde(default)]
    pub compress: CompressInfo,
    /// Row alignment in bytes, 0 for the default 64.
    #[serde(default)]
    pub align: u32,
}

impl ImageSpec {
    pub fn new(height: u32, stride: u32, format: PixelFormat) -> Self {
        Self {
            height,
            stride,
            format,
            compress: CompressInfo::NONE,
            align: 0,
        }
    }

    pub fn with_compress(mut self, compress: CompressInfo) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_align(mut self, align: u32) -> Self {
        self.align = align;
        self
    }

    /// Byte size of one buffer for this spec.
    pub fn buffer_size(&self) -> u64 {
        image_buffer_size(
            self.height,
            self.stride,
            self.format,
            &self.compress,
            self.align,
        )
    }
}

/// Codec payloads understood by `decoder_picture_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecPayload {
    H264,
    H265,
    Jpeg,
    Mjpeg,
}

fn width_beats(width: u32, bits: u32) -> u64 {
    (u64::from(width) * u64::from(bits)).div_ceil(64)
}

fn round_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Scale a YUV buffer by its lossy compression level.
///
/// Only levels `1..=10` apply. 8-bit content additionally caps at level 8,
/// and depths other than 8 and 10 are left uncompressed.
fn apply_lossy_yuv(size: u64, bits: u32, level: u32) -> u64 {
    if !(1..=10).contains(&level) {
        return size;
    }
    let level = u64::from(level);
    match bits {
        8 if level <= 8 => size * level / 8,
        10 => size * level / 10,
        _ => size,
    }
}

/// Lossy raw buffers are split into fixed-width tiles, each carrying its
/// own header and padded to a 64-byte boundary except the last.
fn lossy_raw_size(stride: u64, height: u64, bits: u64) -> u64 {
    let tile = if height > 2160 { 896 } else { 768 };
    let tiles = stride.div_ceil(tile);
    let packed = |width: u64| (width * height * bits / 2).div_ceil(64) * 8;
    let padded = |width: u64| round_up(packed(width), 64);

    if tiles <= 1 {
        return packed((tiles * 2).saturating_sub(2) * 32 + stride);
    }

    let first = padded(32 + tile);
    let middle = padded(64 + tile) * (tiles - 2);
    let last = packed(32 + stride - tile * (tiles - 1));
    first + middle + last
}

/// Byte size of one frame buffer.
///
/// `stride` is in pixels. The row is rounded to whole 64-bit beats, then to
/// `align` bytes (64 when `align` is 0). Heights round up to 8 lines for
/// every known layout; unknown formats are sized as 8-bit 4:2:0 with the
/// height taken as given.
pub fn image_buffer_size(
    height: u32,
    stride: u32,
    format: PixelFormat,
    compress: &CompressInfo,
    align: u32,
) -> u64 {
    let bits = if compress.is_active() {
        format.compressed_bits_per_pixel()
    } else {
        format.bits_per_pixel()
    };

    let beat_bytes = width_beats(stride, bits) * 8;
    let row_bytes = if align != 0 {
        round_up(beat_bytes, u64::from(align)) / 8 * 8
    } else {
        round_up(beat_bytes, DEFAULT_ALIGN)
    };

    let layout = format.layout();
    let rows = match layout {
        Layout::Other => u64::from(height),
        _ => u64::from(height).next_multiple_of(8),
    };
    let size = layout.scale(row_bytes * rows);

    match compress.mode {
        CompressMode::None => size,
        CompressMode::Lossless if layout == Layout::Raw => size + rows * LOSSLESS_RAW_HEADER,
        CompressMode::Lossless => size + rows * LOSSLESS_YUV_HEADER,
        CompressMode::Lossy if layout == Layout::Raw => {
            lossy_raw_size(u64::from(stride), rows, u64::from(bits))
        }
        CompressMode::Lossy => apply_lossy_yuv(size, bits, compress.level),
    }
}

/// Row stride in bytes for `width` pixels of `format`, rounded up to
/// `align` bytes (64 when `align` is 0).
pub fn image_stride_bytes(width: u32, format: PixelFormat, align: u32) -> u64 {
    let beat_bytes = width_beats(width, format.bits_per_pixel()) * 8;
    if align != 0 {
        round_up(beat_bytes, u64::from(align))
    } else {
        round_up(beat_bytes, DEFAULT_ALIGN)
    }
}

/// Byte size of a YUV buffer whose stride is already known in bytes.
pub fn yuv_image_buffer_size(
    height: u32,
    stride_bytes: u32,
    format: PixelFormat,
    compress: &CompressInfo,
) -> u64 {
    let rows = u64::from(height).next_multiple_of(8);
    let layout = match format.layout() {
        Layout::Raw => Layout::Other,
        other => other,
    };
    let size = layout.scale(u64::from(stride_bytes) * rows);

    match compress.mode {
        CompressMode::None => size,
        CompressMode::Lossless => size + rows * LOSSLESS_YUV_HEADER,
        CompressMode::Lossy => apply_lossy_yuv(size, format.bits_per_pixel(), compress.level),
    }
}

/// Picture buffer needed by the video decoder for one frame.
///
/// H.264 pictures carry 64 bytes of motion vector data per macroblock plus
/// a 32-byte table. Returns `None` for payloads without a known layout.
pub fn decoder_picture_size(width: u32, height: u32, payload: CodecPayload) -> Option<u64> {
    let w = u64::from(width).next_multiple_of(16);
    let h = u64::from(height).next_multiple_of(16);
    let picture = w * h * 3 / 2;
    match payload {
        CodecPayload::H264 => {
            let macroblocks = (w / 16) * (h / 16);
            Some(picture + macroblocks * 64 + 32)
        }
        CodecPayload::Jpeg | CodecPayload::Mjpeg => Some(picture),
        CodecPayload::H265 => None,
    }
}

/// Output buffer size for the JPEG decoder.
///
/// Formats outside the YUV ranges are sized as 4:4:4.
pub fn jpeg_decoder_yuv_size(width: u32, height: u32, format: PixelFormat) -> u64 {
    let area = u64::from(width).next_multiple_of(16) * u64::from(height).next_multiple_of(16);
    format.decoder_layout().scale(area)
}
