use serde::Serialize;
use std::time::Instant;

/// Counters for one raw frame dispatcher.
pub struct DispatchStats {
    forwarded: u64,
    stale_dropped: u64,
    send_failures: u64,
    empty_polls: u64,
    fetch_errors: u64,
    last_seq: Option<u64>,
    start_time: Instant,
}

/// Snapshot of dispatch stats for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSnapshot {
    pub forwarded: u64,
    pub stale_dropped: u64,
    pub send_failures: u64,
    pub empty_polls: u64,
    pub fetch_errors: u64,
    pub last_seq: Option<u64>,
    pub forward_rate: f64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            forwarded: 0,
            stale_dropped: 0,
            send_failures: 0,
            empty_polls: 0,
            fetch_errors: 0,
            last_seq: None,
            start_time: Instant::now(),
        }
    }

    /// Record a matched set handed to the pipe.
    pub fn record_forward(&mut self, seq: u64) {
        self.forwarded += 1;
        self.last_seq = Some(seq);
    }

    /// Record a frame released because another exposure was ahead of it.
    pub fn record_stale(&mut self) {
        self.stale_dropped += 1;
    }

    pub fn record_send_failure(&mut self) {
        self.send_failures += 1;
    }

    pub fn record_empty(&mut self) {
        self.empty_polls += 1;
    }

    pub fn record_fetch_error(&mut self) {
        self.fetch_errors += 1;
    }

    /// Forwarded sets per second since creation.
    pub fn forward_rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.forwarded as f64 / elapsed
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            forwarded: self.forwarded,
            stale_dropped: self.stale_dropped,
            send_failures: self.send_failures,
            empty_polls: self.empty_polls,
            fetch_errors: self.fetch_errors,
            last_seq: self.last_seq,
            forward_rate: self.forward_rate(),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}
