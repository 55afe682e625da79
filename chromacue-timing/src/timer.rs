use std::time::{Duration, Instant};

/// High-precision monotonic timer. Timestamps are opaque to callers so a
/// manual clock can stand in during tests.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn frame_count(&self) -> usize;
    fn frame_stats(&self) -> FrameStats;
}

/// Rolling frame-time statistics, reported at shutdown.
#[derive(Debug, Clone)]
pub struct FrameStats {
    pub average_frame_time_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Instant-based timer; nanosecond timestamps from process start, with a
/// platform high-precision sleep on linux.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: Vec<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }

    fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(d);
    }

    fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    fn frame_stats(&self) -> FrameStats {
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return FrameStats {
                average_frame_time_ns: 0.0,
                min_frame_time_ns: 0.0,
                max_frame_time_ns: 0.0,
                effective_fps: 0.0,
            };
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        FrameStats {
            average_frame_time_ns: avg,
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: Vec::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        let b = timer.now();
        assert!(b >= a);
    }

    #[test]
    fn frame_stats_track_recorded_frames() {
        let mut timer = HighPrecisionTimer::new();
        assert_eq!(timer.frame_count(), 0);
        timer.record_frame(Duration::from_millis(10));
        timer.record_frame(Duration::from_millis(20));
        let stats = timer.frame_stats();
        assert_eq!(timer.frame_count(), 2);
        assert!((stats.average_frame_time_ns - 15e6).abs() < 1.0);
        assert_eq!(stats.min_frame_time_ns, 10e6);
        assert_eq!(stats.max_frame_time_ns, 20e6);
    }

    #[test]
    fn sample_buffer_is_bounded() {
        let mut timer = HighPrecisionTimer::new();
        timer.max_samples = 4;
        for i in 0..10 {
            timer.record_frame(Duration::from_millis(i));
        }
        assert_eq!(timer.frame_count(), 4);
    }
}
