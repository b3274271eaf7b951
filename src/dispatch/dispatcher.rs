//! Raw frame dispatcher.
//!
//! Pulls one frame per exposure from a device dump queue, drops stale
//! exposures until every sequence number matches, then injects the matched
//! set into the pipe's ITP frame source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::camera::backend::CaptureBackend;
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{
    DumpNode, FetchWait, FrameSet, FrameSourceId, HdrMode, PipeId, RawFrame,
};
use crate::dispatch::stats::{DispatchSnapshot, DispatchStats};

/// Bounded wait for the first fetch of each exposure.
pub const FETCH_TIMEOUT_MS: u32 = 1000;
/// Bounded wait when injecting a matched set.
pub const SEND_TIMEOUT_MS: u32 = 1000;
/// Pause after a fetch error other than an empty queue.
const FETCH_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Per-dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub pipe: PipeId,
    pub hdr: HdrMode,
    pub fetch_timeout_ms: u32,
    pub send_timeout_ms: u32,
    pub error_backoff: Duration,
}

impl DispatchConfig {
    pub fn new(pipe: PipeId, hdr: HdrMode) -> Self {
        Self {
            pipe,
            hdr,
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
            send_timeout_ms: SEND_TIMEOUT_MS,
            error_backoff: FETCH_ERROR_BACKOFF,
        }
    }
}

/// Result of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Forwarded { seq: u64 },
    /// The set matched but the pipe refused it.
    SendFailed { seq: u64 },
    /// An exposure queue had nothing ready.
    Empty,
    FetchFailed,
}

fn release_all(backend: &dyn CaptureBackend, pipe: PipeId, frames: &[RawFrame]) {
    for frame in frames {
        if let Err(e) = backend.release_raw_frame(pipe, DumpNode::Ife, frame) {
            tracing::warn!(
                "pipe {pipe}: release of exposure {} seq {} failed: {e}",
                frame.exposure,
                frame.seq
            );
        }
    }
}

/// Run one fetch, reconcile and forward cycle.
///
/// Every frame fetched during the cycle is released before returning,
/// whatever the outcome. Reconciliation has no iteration bound: it keeps
/// replacing lagging exposures until all sequence numbers agree or a
/// replacement fetch fails.
pub fn dispatch_cycle(
    backend: &dyn CaptureBackend,
    config: &DispatchConfig,
    stats: &Mutex<DispatchStats>,
) -> CycleOutcome {
    let pipe = config.pipe;
    let exposures = config.hdr.exposures();
    let mut frames: Vec<RawFrame> = Vec::with_capacity(exposures);

    for exposure in 0..exposures as u8 {
        let wait = FetchWait::Millis(config.fetch_timeout_ms);
        match backend.get_raw_frame(pipe, DumpNode::Ife, exposure, wait) {
            Ok(frame) => frames.push(frame),
            Err(e) if e.is_queue_empty() => {
                release_all(backend, pipe, &frames);
                stats.lock().record_empty();
                return CycleOutcome::Empty;
            }
            Err(e) => {
                tracing::warn!("pipe {pipe}: fetch of exposure {exposure} failed: {e}");
                std::thread::sleep(config.error_backoff);
                release_all(backend, pipe, &frames);
                stats.lock().record_fetch_error();
                return CycleOutcome::FetchFailed;
            }
        }
    }

    let mut max_seq = frames.iter().map(|f| f.seq).max().unwrap_or(0);
    loop {
        let mut stale = false;
        let mut lost = None;
        for (slot, frame) in frames.iter_mut().enumerate() {
            if frame.seq >= max_seq {
                continue;
            }
            tracing::debug!(
                "pipe {pipe}: exposure {} seq {} behind {max_seq}, dropping block {:#x}",
                frame.exposure,
                frame.seq,
                frame.block
            );
            release_all(backend, pipe, std::slice::from_ref(&*frame));
            stats.lock().record_stale();
            stale = true;

            match backend.get_raw_frame(pipe, DumpNode::Ife, frame.exposure, FetchWait::Forever) {
                Ok(next) => *frame = next,
                Err(e) => {
                    tracing::warn!(
                        "pipe {pipe}: refetch of exposure {} failed: {e}",
                        frame.exposure
                    );
                    lost = Some(slot);
                    break;
                }
            }
        }

        if let Some(slot) = lost {
            frames.remove(slot);
            release_all(backend, pipe, &frames);
            stats.lock().record_fetch_error();
            return CycleOutcome::FetchFailed;
        }
        if !stale {
            break;
        }
        max_seq = frames.iter().map(|f| f.seq).max().unwrap_or(max_seq);
    }

    let set = match FrameSet::aligned(frames) {
        Ok(set) => set,
        Err(frames) => {
            release_all(backend, pipe, &frames);
            stats.lock().record_fetch_error();
            return CycleOutcome::FetchFailed;
        }
    };

    let seq = set.seq();
    let outcome = match backend.send_raw_frame(
        pipe,
        FrameSourceId::Itp,
        config.hdr,
        &set,
        config.send_timeout_ms,
    ) {
        Ok(()) => {
            stats.lock().record_forward(seq);
            CycleOutcome::Forwarded { seq }
        }
        Err(e) => {
            tracing::warn!("pipe {pipe}: send of seq {seq} failed: {e}");
            stats.lock().record_send_failure();
            CycleOutcome::SendFailed { seq }
        }
    };
    release_all(backend, pipe, set.frames());
    outcome
}

/// Background thread running dispatch cycles for one pipe.
pub struct FrameDispatcher {
    pipe: PipeId,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<Mutex<DispatchStats>>,
}

impl FrameDispatcher {
    /// Spawn the dispatcher thread.
    ///
    /// The stop flag is only checked between cycles, so shutdown waits for
    /// the cycle in flight.
    pub fn spawn(backend: Arc<dyn CaptureBackend>, config: DispatchConfig) -> Result<Self> {
        let pipe = config.pipe;
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(DispatchStats::new()));

        let running_clone = Arc::clone(&running);
        let stats_clone = Arc::clone(&stats);
        let thread = std::thread::Builder::new()
            .name(format!("raw-disp-{pipe}"))
            .spawn(move || {
                tracing::debug!("pipe {pipe}: dispatcher started");
                while running_clone.load(Ordering::Acquire) {
                    dispatch_cycle(&*backend, &config, &stats_clone);
                }
                tracing::debug!("pipe {pipe}: dispatcher stopped");
            })
            .map_err(|e| CameraError::Thread(format!("failed to spawn dispatcher: {e}")))?;

        Ok(Self {
            pipe,
            running,
            thread: Some(thread),
            stats,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.lock().snapshot()
    }

    /// Signal the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("pipe {}: dispatcher thread panicked", self.pipe);
            }
        }
    }
}

impl Drop for FrameDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
