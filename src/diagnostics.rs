use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use log::warn;

use crate::device::{DeviceApi, ViewId};
use crate::panel::PanelState;

const RTT_BUCKETS_MS: [f64; 5] = [10.0, 50.0, 100.0, 250.0, 1_000.0];

pub struct RttStats {
    total_requests: u64,
    failed_requests: u64,
    slow_requests: u64,
    slow_threshold: Duration,
    last_rtt: Duration,
    window: VecDeque<Duration>,
    capacity: usize,
    histogram: [u64; 6],
}

impl RttStats {
    pub fn new(window_size: usize, slow_threshold: Duration) -> Self {
        let capacity = window_size.max(1);
        Self {
            total_requests: 0,
            failed_requests: 0,
            slow_requests: 0,
            slow_threshold,
            last_rtt: Duration::ZERO,
            window: VecDeque::with_capacity(capacity),
            capacity,
            histogram: [0; 6],
        }
    }

    pub fn record_success(&mut self, rtt: Duration) {
        self.total_requests += 1;
        self.last_rtt = rtt;
        if rtt > self.slow_threshold {
            self.slow_requests += 1;
        }
        if self.window.len() == self.capacity {
            let _ = self.window.pop_front();
        }
        self.window.push_back(rtt);
        let ms = rtt.as_secs_f64() * 1_000.0;
        let bucket = RTT_BUCKETS_MS
            .iter()
            .position(|limit| ms <= *limit)
            .unwrap_or(RTT_BUCKETS_MS.len());
        self.histogram[bucket] += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests
    }

    pub fn slow_requests(&self) -> u64 {
        self.slow_requests
    }

    pub fn last_rtt(&self) -> Duration {
        self.last_rtt
    }

    pub fn mean_rtt(&self) -> Option<Duration> {
        if self.window.is_empty() {
            return None;
        }
        let total: Duration = self.window.iter().sum();
        Some(total / self.window.len() as u32)
    }

    pub fn max_rtt(&self) -> Option<Duration> {
        self.window.iter().max().copied()
    }

    pub fn histogram(&self) -> [u64; 6] {
        self.histogram
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsOptions {
    pub samples: u32,
    pub interval: Duration,
    pub slow_threshold: Duration,
}

pub fn run_diagnostics(
    device: &dyn DeviceApi,
    device_url: &str,
    options: DiagnosticsOptions,
) -> Result<()> {
    println!("PandaPanel diagnostics");
    println!("Device: {device_url}");
    println!(
        "Sampling /get_settings {} times every {} ms...",
        options.samples,
        options.interval.as_millis()
    );

    let mut rtt = RttStats::new(256, options.slow_threshold);
    let mut state = PanelState::new(ViewId::Time, Instant::now());
    for sample in 0..options.samples {
        if sample > 0 {
            std::thread::sleep(options.interval);
        }
        let sent = Instant::now();
        match device.get_settings() {
            Ok(settings) => {
                let elapsed = sent.elapsed();
                rtt.record_success(elapsed);
                // Midpoint of the request is the best guess for when the device
                // sampled its clock.
                state.apply_settings(&settings, sent + elapsed / 2);
            }
            Err(err) => {
                warn!("sample {} failed: {err}", sample + 1);
                rtt.record_failure();
                state.record_resync_failure();
            }
        }
    }

    let stats = state.stats();
    println!("Summary:");
    println!("  Requests: {}", rtt.total_requests());
    println!("  Failed: {}", rtt.failed_requests());
    println!("  Successful fetches: {}", stats.successes());
    println!(
        "  Consecutive failures at end: {}",
        stats.consecutive_failures()
    );
    println!(
        "  Slow (> {} ms): {}",
        options.slow_threshold.as_millis(),
        rtt.slow_requests()
    );
    if let Some(mean) = rtt.mean_rtt() {
        println!("  Mean RTT: {:.1} ms", mean.as_secs_f64() * 1_000.0);
    }
    if let Some(max) = rtt.max_rtt() {
        println!("  Max RTT: {:.1} ms", max.as_secs_f64() * 1_000.0);
    }
    println!(
        "  Last RTT: {:.1} ms",
        rtt.last_rtt().as_secs_f64() * 1_000.0
    );
    println!("  RTT histogram buckets (<=10, <=50, <=100, <=250, <=1000, >1000 ms):");
    println!("  {:?}", rtt.histogram());
    match (stats.last_drift_ms(), stats.mean_abs_drift_ms()) {
        (Some(last), Some(mean)) => {
            println!("  Last drift: {last} ms");
            println!("  Mean |drift|: {mean:.1} ms");
        }
        _ => println!("  Drift: not enough successful samples"),
    }
    println!("  Device clock: {}", state.display().clock);

    if options.samples > 0 && stats.failures() == u64::from(options.samples) {
        bail!("device did not answer any of {} requests", options.samples);
    }
    Ok(())
}
