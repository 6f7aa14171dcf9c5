//! Process-wide counters and histograms (spec §5: "Counters and
//! histograms are process-wide atomics, safe to update from any
//! thread."). Deliberately plain `AtomicU64`s rather than a metrics
//! crate - the spec names the exact mechanism, and every teacher crate
//! in this corpus that counts things does so the same way.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A coarse latency histogram: fixed millisecond buckets plus an overflow
/// bucket, enough for "send-packet and receive-frame latency" tracking
/// without pulling in a full metrics crate for the core's internal use.
pub struct Histogram {
    buckets_ms: &'static [u64],
    counts: Vec<AtomicU64>,
    sum_ms: AtomicU64,
    observations: AtomicU64,
}

impl Histogram {
    pub const DEFAULT_BUCKETS_MS: &'static [u64] = &[1, 2, 5, 10, 20, 50, 100, 250, 500, 1000];

    pub fn new(buckets_ms: &'static [u64]) -> Self {
        Self {
            buckets_ms,
            counts: (0..=buckets_ms.len()).map(|_| AtomicU64::new(0)).collect(),
            sum_ms: AtomicU64::new(0),
            observations: AtomicU64::new(0),
        }
    }

    pub fn observe_ms(&self, value_ms: u64) {
        let bucket = self
            .buckets_ms
            .iter()
            .position(|&b| value_ms <= b)
            .unwrap_or(self.buckets_ms.len());
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(value_ms, Ordering::Relaxed);
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observation_count(&self) -> u64 {
        self.observations.load(Ordering::Relaxed)
    }

    pub fn mean_ms(&self) -> f64 {
        let n = self.observation_count();
        if n == 0 {
            0.0
        } else {
            self.sum_ms.load(Ordering::Relaxed) as f64 / n as f64
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUCKETS_MS)
    }
}

#[derive(Default)]
pub struct NetworkDecodeMetrics {
    pub chunks_mismatch: Counter,
    pub frames_emitted: Counter,
}

#[derive(Default)]
pub struct ImageDecodeMetrics {
    pub received_messages: Counter,
    pub received_bytes: Counter,
    pub dropped_messages: Counter,
    pub received_frames: Counter,
    pub send_packet_latency: Histogram,
    pub receive_frame_latency: Histogram,
}

#[derive(Default)]
pub struct BotMetrics {
    pub frame_processing_time: Histogram,
    pub frames_processed: Counter,
    pub messages_sent: Counter,
    pub messages_sent_analysis: Counter,
    pub messages_sent_debug: Counter,
    pub messages_sent_control: Counter,
    pub control_received: Counter,
    pub control_sent: Counter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::new();
        c.increment();
        c.add(4);
        assert_eq!(5, c.get());
    }

    #[test]
    fn histogram_buckets_and_means() {
        let h = Histogram::new(&[10, 100]);
        h.observe_ms(5);
        h.observe_ms(50);
        h.observe_ms(500);
        assert_eq!(3, h.observation_count());
        assert!((h.mean_ms() - 185.0).abs() < 1e-9);
    }
}
