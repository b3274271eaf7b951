//! Single-shot still capture: a raw frame is pushed through the ISP of an
//! offline pipe and the resulting YUV frame is handed to the caller.

use crate::camera::backend::CaptureBackend;
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{FrameSet, FrameSourceId, HdrMode, PipeId, YuvFrame};

const CAPTURE_TIMEOUT_MS: u32 = 3000;
const MAIN_CHANNEL: u8 = 0;

/// Turn `raw` into a YUV still on the `capture` pipe with 3A locked to `reference`.
///
/// The ISP output for the first injected frame is discarded; the frame is
/// sent a second time and that result is passed to `use_frame`. Every YUV
/// frame taken is released before returning.
pub fn capture_still<T>(
    backend: &dyn CaptureBackend,
    capture: PipeId,
    reference: PipeId,
    raw: &FrameSet,
    use_frame: impl FnOnce(&YuvFrame) -> T,
) -> Result<T> {
    if raw.frames().len() != 1 {
        return Err(CameraError::Config(format!(
            "still capture takes one linear exposure, got {}",
            raw.frames().len()
        )));
    }

    backend.isp_lock_3a_from(capture, reference)?;

    let settle = process_once(backend, capture, raw)?;
    release(backend, capture, &settle);

    let frame = process_once(backend, capture, raw)?;
    let result = use_frame(&frame);
    release(backend, capture, &frame);

    tracing::debug!("pipe {capture}: still captured from raw seq {}", raw.seq());
    Ok(result)
}

fn process_once(backend: &dyn CaptureBackend, pipe: PipeId, raw: &FrameSet) -> Result<YuvFrame> {
    backend.isp_run_once(pipe)?;
    backend.send_raw_frame(
        pipe,
        FrameSourceId::Ife,
        HdrMode::Linear,
        raw,
        CAPTURE_TIMEOUT_MS,
    )?;
    backend.get_yuv_frame(pipe, MAIN_CHANNEL, CAPTURE_TIMEOUT_MS)
}

fn release(backend: &dyn CaptureBackend, pipe: PipeId, frame: &YuvFrame) {
    if let Err(e) = backend.release_yuv_frame(pipe, MAIN_CHANNEL, frame) {
        tracing::warn!("pipe {pipe}: release of yuv frame {} failed: {e}", frame.seq);
    }
}
