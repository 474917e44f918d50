//! Health counters for the capture and recording pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Health metrics for one controller
///
/// Shared between the pacing clock, the compositor and the recorder task.
/// All fields use atomic operations for thread-safe access.
pub struct RecorderHealth {
    /// Ticks delivered by the pacing clock
    pub ticks_emitted: AtomicU64,

    /// Ticks discarded because the render task lagged behind
    pub ticks_dropped: AtomicU64,

    /// Frames copied onto the drawable surface
    pub frames_composed: AtomicU64,

    /// Ticks on which the source had no frame to copy
    pub frames_missed: AtomicU64,

    /// Chunks handed out by the recorder (empty ones included)
    pub chunks_emitted: AtomicU64,

    /// Chunks that carried no data
    pub empty_chunks: AtomicU64,

    /// Total bytes of chunk data produced
    pub bytes_recorded: AtomicU64,

    /// Timestamp (Unix microseconds) of the last non-empty chunk
    pub last_chunk_time: AtomicU64,
}

impl RecorderHealth {
    pub fn new() -> Self {
        Self {
            ticks_emitted: AtomicU64::new(0),
            ticks_dropped: AtomicU64::new(0),
            frames_composed: AtomicU64::new(0),
            frames_missed: AtomicU64::new(0),
            chunks_emitted: AtomicU64::new(0),
            empty_chunks: AtomicU64::new(0),
            bytes_recorded: AtomicU64::new(0),
            last_chunk_time: AtomicU64::new(now_micros()),
        }
    }

    pub fn record_tick(&self) {
        self.ticks_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_drop(&self) {
        self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one draw attempt
    pub fn record_compose(&self, drawn: bool) {
        if drawn {
            self.frames_composed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frames_missed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_chunk(&self, size: usize) {
        self.chunks_emitted.fetch_add(1, Ordering::Relaxed);
        if size == 0 {
            self.empty_chunks.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.bytes_recorded.fetch_add(size as u64, Ordering::Relaxed);
        self.last_chunk_time.store(now_micros(), Ordering::Relaxed);
    }

    pub fn ticks_emitted(&self) -> u64 {
        self.ticks_emitted.load(Ordering::Relaxed)
    }

    pub fn ticks_dropped(&self) -> u64 {
        self.ticks_dropped.load(Ordering::Relaxed)
    }

    pub fn frames_composed(&self) -> u64 {
        self.frames_composed.load(Ordering::Relaxed)
    }

    pub fn frames_missed(&self) -> u64 {
        self.frames_missed.load(Ordering::Relaxed)
    }

    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted.load(Ordering::Relaxed)
    }

    pub fn empty_chunks(&self) -> u64 {
        self.empty_chunks.load(Ordering::Relaxed)
    }

    pub fn bytes_recorded(&self) -> u64 {
        self.bytes_recorded.load(Ordering::Relaxed)
    }

    /// Tick drop rate as a percentage of all ticks
    pub fn tick_drop_rate(&self) -> f64 {
        let dropped = self.ticks_dropped();
        let total = self.ticks_emitted() + dropped;
        if total == 0 {
            return 0.0;
        }
        (dropped as f64 / total as f64) * 100.0
    }

    /// Check if no data has been recorded for the given duration
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let last = self.last_chunk_time.load(Ordering::Relaxed);
        now_micros().saturating_sub(last) > threshold.as_micros() as u64
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            ticks_emitted: self.ticks_emitted(),
            ticks_dropped: self.ticks_dropped(),
            tick_drop_rate: self.tick_drop_rate(),
            frames_composed: self.frames_composed(),
            frames_missed: self.frames_missed(),
            chunks_emitted: self.chunks_emitted(),
            empty_chunks: self.empty_chunks(),
            bytes_recorded: self.bytes_recorded(),
        }
    }
}

impl Default for RecorderHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub ticks_emitted: u64,
    pub ticks_dropped: u64,
    pub tick_drop_rate: f64,
    pub frames_composed: u64,
    pub frames_missed: u64,
    pub chunks_emitted: u64,
    pub empty_chunks: u64,
    pub bytes_recorded: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} ticks ({} dropped, {:.2}%), {} frames composed ({} missed), {} chunks ({} empty), {} bytes",
            self.ticks_emitted,
            self.ticks_dropped,
            self.tick_drop_rate,
            self.frames_composed,
            self.frames_missed,
            self.chunks_emitted,
            self.empty_chunks,
            self.bytes_recorded
        )
    }
}
