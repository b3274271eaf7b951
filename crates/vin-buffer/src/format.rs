use serde::{Deserialize, Serialize};

/// Image formats understood by the VIN buffer tools.
///
/// Discriminants match the hardware format codes so values can be passed
/// straight through to a native backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PixelFormat {
    Yuv400 = 0x00,

    Yuv420Planar = 0x01,
    Yuv420PlanarVu = 0x02,
    Yuv420Semiplanar = 0x03,
    Yuv420SemiplanarVu = 0x04,

    Yuv422Planar = 0x08,
    Yuv422PlanarVu = 0x09,
    Yuv422Semiplanar = 0x0A,
    Yuv422SemiplanarVu = 0x0B,
    Yuv422InterleavedYuvy = 0x0C,
    Yuv422InterleavedYuyv = 0x0D,
    Yuv422InterleavedUyvy = 0x0E,
    Yuv422InterleavedVyuy = 0x0F,
    Yuv422InterleavedYvyu = 0x10,

    Yuv444Planar = 0x14,
    Yuv444PlanarVu = 0x15,
    Yuv444Semiplanar = 0x16,
    Yuv444SemiplanarVu = 0x17,
    Yuv444Packed = 0x18,

    Yuv400Bit10 = 0x20,
    Yuv420PlanarBit10Packed4y5b = 0x24,
    Yuv420PlanarBit10I010 = 0x25,
    Yuv420SemiplanarBit10P101010 = 0x28,
    Yuv420SemiplanarBit10P010 = 0x2A,
    Yuv420SemiplanarBit10P016 = 0x2C,
    Yuv420SemiplanarBit10I016 = 0x2E,
    Yuv420SemiplanarBit10P12b16 = 0x2F,
    Yuv444PackedBit10P010 = 0x30,
    Yuv444PackedBit10P101010 = 0x32,
    Yuv422SemiplanarBit10P101010 = 0x33,
    Yuv422SemiplanarBit10P010 = 0x34,

    BayerRaw8 = 0x80,
    BayerRaw10 = 0x81,
    BayerRaw12 = 0x82,
    BayerRaw14 = 0x83,
    BayerRaw16 = 0x84,
    BayerRaw10Packed = 0x85,
    BayerRaw12Packed = 0x86,
    BayerRaw14Packed = 0x87,

    Rgb565 = 0xA0,
    Rgb888 = 0xA1,
    Bgr888 = 0xA5,
    Bgr565 = 0xA6,
    Argb8888 = 0xC7,
    Rgba8888 = 0xC9,
    Bitmap = 0xE0,
}

/// How a format's planes scale the luma area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Single Bayer plane.
    Raw,
    /// Luma only.
    Mono,
    Yuv420,
    Yuv422,
    Yuv444,
    /// Not sized explicitly; treated as 4:2:0 without height rounding.
    Other,
}

impl Layout {
    /// Multiply an area by this layout's plane factor (1, 1.5, 2 or 3).
    pub fn scale(self, area: u64) -> u64 {
        match self {
            Layout::Raw | Layout::Mono => area,
            Layout::Yuv420 | Layout::Other => area * 3 / 2,
            Layout::Yuv422 => area * 2,
            Layout::Yuv444 => area * 3,
        }
    }
}

impl PixelFormat {
    /// Bits per pixel used by every sizing function in this crate.
    ///
    /// Unpacked raw is stored in 16-bit containers. Formats without an
    /// entry fall back to 8.
    pub fn bits_per_pixel(self) -> u32 {
        use PixelFormat::*;
        match self {
            BayerRaw8 => 8,
            BayerRaw10Packed => 10,
            BayerRaw12Packed => 12,
            BayerRaw14Packed => 14,
            BayerRaw10 | BayerRaw12 | BayerRaw14 | BayerRaw16 => 16,

            Yuv400 | Yuv420Planar | Yuv420PlanarVu | Yuv420Semiplanar | Yuv420SemiplanarVu
            | Yuv422Planar | Yuv422PlanarVu | Yuv422Semiplanar | Yuv422SemiplanarVu
            | Yuv422InterleavedYuvy | Yuv422InterleavedYuyv | Yuv422InterleavedUyvy
            | Yuv422InterleavedVyuy | Yuv444Planar | Yuv444PlanarVu | Yuv444Semiplanar
            | Yuv444SemiplanarVu | Yuv444Packed => 8,

            Yuv400Bit10
            | Yuv420PlanarBit10Packed4y5b
            | Yuv420SemiplanarBit10P101010
            | Yuv444PackedBit10P101010
            | Yuv422SemiplanarBit10P101010 => 10,

            Yuv420PlanarBit10I010
            | Yuv420SemiplanarBit10P010
            | Yuv420SemiplanarBit10P016
            | Yuv420SemiplanarBit10I016
            | Yuv444PackedBit10P010 => 16,

            _ => 8,
        }
    }

    /// Bit depth once frame buffer compression is enabled.
    ///
    /// Compressed raw drops its 16-bit container and is stored at the
    /// sensor's native depth. Other formats keep `bits_per_pixel`.
    pub fn compressed_bits_per_pixel(self) -> u32 {
        use PixelFormat::*;
        match self {
            BayerRaw8 => 8,
            BayerRaw10 | BayerRaw10Packed => 10,
            BayerRaw12 | BayerRaw12Packed => 12,
            BayerRaw14 | BayerRaw14Packed => 14,
            BayerRaw16 => 16,
            other => other.bits_per_pixel(),
        }
    }

    pub fn is_bayer(self) -> bool {
        self.layout() == Layout::Raw
    }

    /// Plane layout used for buffer area scaling.
    pub fn layout(self) -> Layout {
        use PixelFormat::*;
        match self {
            BayerRaw8 | BayerRaw10 | BayerRaw12 | BayerRaw14 | BayerRaw16 | BayerRaw10Packed
            | BayerRaw12Packed | BayerRaw14Packed => Layout::Raw,

            Yuv400 | Yuv400Bit10 => Layout::Mono,

            Yuv420Planar
            | Yuv420PlanarVu
            | Yuv420Semiplanar
            | Yuv420SemiplanarVu
            | Yuv420PlanarBit10Packed4y5b
            | Yuv420PlanarBit10I010
            | Yuv420SemiplanarBit10P101010
            | Yuv420SemiplanarBit10P010
            | Yuv420SemiplanarBit10P016
            | Yuv420SemiplanarBit10I016 => Layout::Yuv420,

            Yuv422Planar | Yuv422PlanarVu | Yuv422Semiplanar | Yuv422SemiplanarVu
            | Yuv422InterleavedYuvy | Yuv422InterleavedYuyv | Yuv422InterleavedUyvy
            | Yuv422InterleavedVyuy => Layout::Yuv422,

            Yuv444Planar | Yuv444PlanarVu | Yuv444Semiplanar | Yuv444SemiplanarVu
            | Yuv444Packed | Yuv444PackedBit10P010 | Yuv444PackedBit10P101010 => {
                Layout::Yuv444
            }

            _ => Layout::Other,
        }
    }

    /// Layout family by hardware code range, as the JPEG decoder sees it.
    ///
    /// Wider than `layout`: YVYU counts as 4:2:2 here.
    pub(crate) fn decoder_layout(self) -> Layout {
        match self as u32 {
            0x00 => Layout::Mono,
            0x01..=0x04 => Layout::Yuv420,
            0x08..=0x10 => Layout::Yuv422,
            0x14..=0x18 => Layout::Yuv444,
            _ => Layout::Yuv444,
        }
    }
}

/// Frame buffer compression mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressMode {
    #[default]
    None,
    Lossless,
    Lossy,
}

/// Compression settings attached to a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressInfo {
    #[serde(default)]
    pub mode: CompressMode,
    /// Lossy level, meaningful in `1..=10`.
    #[serde(default)]
    pub level: u32,
}

impl CompressInfo {
    pub const NONE: CompressInfo = CompressInfo {
        mode: CompressMode::None,
        level: 0,
    };

    pub fn lossless() -> Self {
        Self {
            mode: CompressMode::Lossless,
            level: 0,
        }
    }

    pub fn lossy(level: u32) -> Self {
        Self {
            mode: CompressMode::Lossy,
            level,
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode != CompressMode::None
    }
}
