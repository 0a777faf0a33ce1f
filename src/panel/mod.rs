pub mod controller;
pub mod service;

use std::collections::VecDeque;
use std::time::Instant;

use chrono::Timelike;
use log::{debug, warn};

use crate::clock::alarm::AlarmState;
use crate::clock::format::DisplayFormat;
use crate::clock::sync::{ClockDisplay, ClockSync};
use crate::device::{DeviceSettings, ViewId};

const DRIFT_WINDOW: usize = 32;
const HALF_DAY_MS: i64 = 12 * 3_600 * 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadioState {
    pub frequency_mhz: Option<f64>,
    pub volume: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct SyncStats {
    successes: u64,
    failures: u64,
    consecutive_failures: u64,
    last_drift_ms: Option<i64>,
    last_success: Option<Instant>,
    window: VecDeque<i64>,
}

impl Default for SyncStats {
    fn default() -> Self {
        Self {
            successes: 0,
            failures: 0,
            consecutive_failures: 0,
            last_drift_ms: None,
            last_success: None,
            window: VecDeque::with_capacity(DRIFT_WINDOW),
        }
    }
}

impl SyncStats {
    pub fn record_success(&mut self, at: Instant, drift_ms: Option<i64>) {
        self.successes = self.successes.saturating_add(1);
        self.consecutive_failures = 0;
        self.last_success = Some(at);
        if let Some(drift_ms) = drift_ms {
            self.last_drift_ms = Some(drift_ms);
            if self.window.len() == DRIFT_WINDOW {
                let _ = self.window.pop_front();
            }
            self.window.push_back(drift_ms);
        }
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    pub fn last_drift_ms(&self) -> Option<i64> {
        self.last_drift_ms
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    pub fn mean_abs_drift_ms(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let total: i64 = self.window.iter().map(|drift| drift.abs()).sum();
        Some(total as f64 / self.window.len() as f64)
    }
}

/// Wraps a millisecond difference between two times of day into ±12h so a
/// midnight crossing reads as a small drift.
pub fn wrap_drift_ms(diff_ms: i64) -> i64 {
    let day = 2 * HALF_DAY_MS;
    let wrapped = diff_ms.rem_euclid(day);
    if wrapped >= HALF_DAY_MS {
        wrapped - day
    } else {
        wrapped
    }
}

#[derive(Debug, Clone)]
pub struct PanelState {
    clock: ClockSync,
    view: ViewId,
    radio: RadioState,
    display: ClockDisplay,
    stats: SyncStats,
    epoch: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub clock_text: String,
    pub alarm_text: String,
    pub alarm_enabled: bool,
    pub use_24h: bool,
    pub active_view: ViewId,
    pub alarm_toggle_visible: bool,
    pub radio_frequency_text: Option<String>,
    pub radio_volume_text: Option<String>,
    pub sync_status: String,
}

impl PanelState {
    pub fn new(initial_view: ViewId, now: Instant) -> Self {
        let clock = ClockSync::new(now);
        let display = clock.display(now);
        Self {
            clock,
            view: initial_view,
            radio: RadioState::default(),
            display,
            stats: SyncStats::default(),
            epoch: 0,
        }
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    #[cfg(test)]
    pub fn radio(&self) -> RadioState {
        self.radio
    }

    #[cfg(test)]
    pub fn active_view(&self) -> ViewId {
        self.view
    }

    /// Bumped by every change to the clock anchor, alarm or format. A settings
    /// fetch started under an older epoch no longer describes the device.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn set_view(&mut self, view: ViewId) {
        self.view = view;
    }

    pub fn display(&self) -> &ClockDisplay {
        &self.display
    }

    pub fn tick(&mut self, now: Instant) -> &ClockDisplay {
        self.display = self.clock.display(now);
        &self.display
    }

    pub fn set_format(&mut self, format: DisplayFormat, now: Instant) {
        self.display = self.clock.set_format(format, now);
        self.bump_epoch();
    }

    pub fn set_alarm(&mut self, alarm: AlarmState, now: Instant) {
        self.clock.set_alarm(alarm.hour, alarm.minute, alarm.enabled);
        self.display = self.clock.display(now);
        self.bump_epoch();
    }

    pub fn set_alarm_enabled(&mut self, enabled: bool) {
        let alarm = self.clock.alarm();
        self.clock.set_alarm(alarm.hour, alarm.minute, enabled);
        self.bump_epoch();
    }

    pub fn anchor_time(&mut self, device_time: chrono::NaiveTime, observed_at: Instant) {
        self.clock.anchor_time(device_time, observed_at);
        self.display = self.clock.display(observed_at);
        self.bump_epoch();
    }

    pub fn apply_fetched_settings(
        &mut self,
        fetched_at_epoch: u64,
        settings: &DeviceSettings,
        observed_at: Instant,
    ) -> bool {
        if fetched_at_epoch != self.epoch {
            debug!(
                "dropping settings fetched at epoch {fetched_at_epoch}, state is at {}",
                self.epoch
            );
            return false;
        }
        self.apply_settings(settings, observed_at);
        true
    }

    pub fn apply_settings(&mut self, settings: &DeviceSettings, observed_at: Instant) {
        let estimate = self.clock.device_time_at(observed_at);
        let had_anchor = self.stats.last_success().is_some();

        self.clock.anchor(&settings.time, observed_at);
        let fetched = self.clock.current_anchor().device_time;
        let drift_ms = had_anchor.then(|| {
            let diff = i64::from(fetched.num_seconds_from_midnight()) * 1_000
                - (i64::from(estimate.num_seconds_from_midnight()) * 1_000
                    + i64::from(estimate.nanosecond() / 1_000_000));
            wrap_drift_ms(diff)
        });

        match AlarmState::new(
            settings.alarm_hour,
            settings.alarm_minute,
            settings.alarm_toggle,
        ) {
            Some(alarm) => self
                .clock
                .set_alarm(alarm.hour, alarm.minute, alarm.enabled),
            None => warn!(
                "device reported invalid alarm {}:{}, keeping {:?}",
                settings.alarm_hour,
                settings.alarm_minute,
                self.clock.alarm()
            ),
        }

        if let Some(frequency) = settings.radio_frequency {
            self.radio.frequency_mhz = Some(frequency);
        }
        if let Some(volume) = settings.radio_volume {
            self.radio.volume = Some(volume);
        }

        self.display = self
            .clock
            .set_format(DisplayFormat::from_24h_flag(settings.format_24h), observed_at);
        self.stats.record_success(observed_at, drift_ms);
        self.bump_epoch();
    }

    pub fn record_resync_failure(&mut self) {
        self.stats.record_failure();
    }

    pub fn view(&self, now: Instant) -> PanelView {
        let alarm = self.clock.alarm();
        let sync_status = match (self.stats.last_success(), self.stats.consecutive_failures()) {
            (None, 0) => "waiting for device".to_string(),
            (None, failures) => format!("device unreachable ({failures} failed fetches)"),
            (Some(at), 0) => format!(
                "synced {}s ago",
                now.saturating_duration_since(at).as_secs()
            ),
            (Some(at), failures) => format!(
                "last sync {}s ago, {failures} failed since",
                now.saturating_duration_since(at).as_secs()
            ),
        };
        PanelView {
            clock_text: self.clock.tick(now),
            alarm_text: self.clock.format_alarm(),
            alarm_enabled: alarm.enabled,
            use_24h: self.clock.format().is_24h(),
            active_view: self.view,
            alarm_toggle_visible: self.view == ViewId::Alarm,
            radio_frequency_text: self.radio.frequency_mhz.map(|mhz| format!("{mhz:.1}")),
            radio_volume_text: self.radio.volume.map(|volume| volume.to_string()),
            sync_status,
        }
    }
}
