use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Averages over the last metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    /// Mean time spent simulating and compositing one frame.
    pub work_ms: f32,
    /// Mean sleep between frames.
    pub sleep_ms: f32,
    /// Frames whose measured delta hit the clamp.
    pub clamped_frames: u32,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameSample {
    pub(crate) work: Duration,
    pub(crate) sleep: Duration,
    pub(crate) clamped: bool,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    clamped_frames: u32,
    work_sum: Duration,
    sleep_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            frames: 0,
            clamped_frames: 0,
            work_sum: Duration::ZERO,
            sleep_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, sample: FrameSample) {
        self.frames = self.frames.saturating_add(1);
        if sample.clamped {
            self.clamped_frames = self.clamped_frames.saturating_add(1);
        }
        self.work_sum = self.work_sum.saturating_add(sample.work);
        self.sleep_sum = self.sleep_sum.saturating_add(sample.sleep);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let mean_ms = |sum: Duration| {
            if self.frames == 0 {
                0.0
            } else {
                sum.as_secs_f32() * 1000.0 / self.frames as f32
            }
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            work_ms: mean_ms(self.work_sum),
            sleep_ms: mean_ms(self.sleep_sum),
            clamped_frames: self.clamped_frames,
        };

        self.interval_start = now;
        self.frames = 0;
        self.clamped_frames = 0;
        self.work_sum = Duration::ZERO;
        self.sleep_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    fn sample(work_ms: u64, sleep_ms: u64, clamped: bool) -> FrameSample {
        FrameSample {
            work: Duration::from_millis(work_ms),
            sleep: Duration::from_millis(sleep_ms),
            clamped,
        }
    }

    #[test]
    fn snapshot_averages_work_and_sleep() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);

        accumulator.record_frame(sample(10, 30, false));
        accumulator.record_frame(sample(20, 20, true));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.work_ms - 15.0).abs() < 0.001);
        assert!((snapshot.sleep_ms - 25.0).abs() < 0.001);
        assert_eq!(snapshot.clamped_frames, 1);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_frame(sample(16, 5, false));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn snapshot_resets_counters() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_frame(sample(16, 5, true));
        accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first");

        let second = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second");
        assert_eq!(second.fps, 0.0);
        assert_eq!(second.clamped_frames, 0);
        assert_eq!(second.work_ms, 0.0);
    }

    #[test]
    fn publish_and_snapshot_recover_after_poison() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());
        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());

        let expected = LoopMetricsSnapshot {
            fps: 24.0,
            work_ms: 3.0,
            sleep_ms: 38.0,
            clamped_frames: 2,
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
