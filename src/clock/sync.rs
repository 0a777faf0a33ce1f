use std::time::Instant;

use chrono::NaiveTime;
use log::warn;
use thiserror::Error;

use crate::clock::alarm::AlarmState;
use crate::clock::format::{DisplayFormat, format_alarm, format_clock};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum TimeParseError {
    #[error("expected HH:MM:SS with three components, got {0}")]
    ComponentCount(usize),
    #[error("component '{0}' is not a number")]
    NotNumeric(String),
    #[error("{hour:02}:{minute:02}:{second:02} is not a valid time of day")]
    OutOfRange { hour: u32, minute: u32, second: u32 },
}

pub fn try_parse_device_time(input: &str) -> Result<NaiveTime, TimeParseError> {
    let parts = input.trim().split(':').collect::<Vec<_>>();
    if parts.len() != 3 {
        return Err(TimeParseError::ComponentCount(parts.len()));
    }
    let mut values = [0_u32; 3];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<u32>()
            .map_err(|_| TimeParseError::NotNumeric(part.to_string()))?;
    }
    let [hour, minute, second] = values;
    NaiveTime::from_hms_opt(hour, minute, second).ok_or(TimeParseError::OutOfRange {
        hour,
        minute,
        second,
    })
}

/// Never fails: a malformed device timestamp becomes midnight.
pub fn parse_device_time(input: &str) -> NaiveTime {
    try_parse_device_time(input).unwrap_or_else(|err| {
        warn!("malformed device time '{input}' ({err}), falling back to 00:00:00");
        NaiveTime::MIN
    })
}

#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub device_time: NaiveTime,
    pub observed_at: Instant,
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ClockDisplay {
    pub clock: String,
    pub alarm: String,
}

#[derive(Debug, Clone)]
pub struct ClockSync {
    anchor: Anchor,
    format: DisplayFormat,
    alarm: AlarmState,
}

impl ClockSync {
    pub fn new(observed_at: Instant) -> Self {
        Self {
            anchor: Anchor {
                device_time: NaiveTime::MIN,
                observed_at,
            },
            format: DisplayFormat::default(),
            alarm: AlarmState::default(),
        }
    }

    pub fn anchor(&mut self, device_time: &str, observed_at: Instant) {
        self.anchor_time(parse_device_time(device_time), observed_at);
    }

    pub fn anchor_time(&mut self, device_time: NaiveTime, observed_at: Instant) {
        self.anchor = Anchor {
            device_time,
            observed_at,
        };
    }

    pub fn current_anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn device_time_at(&self, now: Instant) -> NaiveTime {
        let elapsed = now.saturating_duration_since(self.anchor.observed_at);
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero());
        let (time, _wrapped_days) = self.anchor.device_time.overflowing_add_signed(elapsed);
        time
    }

    pub fn tick(&self, now: Instant) -> String {
        format_clock(self.device_time_at(now), self.format)
    }

    pub fn format(&self) -> DisplayFormat {
        self.format
    }

    pub fn set_format(&mut self, format: DisplayFormat, now: Instant) -> ClockDisplay {
        self.format = format;
        self.display(now)
    }

    pub fn alarm(&self) -> AlarmState {
        self.alarm
    }

    pub fn set_alarm(&mut self, hour: u32, minute: u32, enabled: bool) {
        debug_assert!(
            hour < 24 && minute < 60,
            "alarm {hour}:{minute} out of range"
        );
        self.alarm = AlarmState {
            hour,
            minute,
            enabled,
        };
    }

    pub fn format_alarm(&self) -> String {
        format_alarm(self.alarm.hour, self.alarm.minute, self.format)
    }

    pub fn display(&self, now: Instant) -> ClockDisplay {
        ClockDisplay {
            clock: self.tick(now),
            alarm: self.format_alarm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Timelike;

    use super::*;

    #[test]
    fn anchor_then_tick_at_zero_elapsed_is_exact() {
        let now = Instant::now();
        let mut sync = ClockSync::new(now);
        for secs in 0..86_400 {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).expect("in range");
            let text = format!(
                "{:02}:{:02}:{:02}",
                time.hour(),
                time.minute(),
                time.second()
            );
            sync.anchor(&text, now);
            assert_eq!(sync.tick(now), text);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_alarm_is_rejected_in_debug_builds() {
        let mut sync = ClockSync::new(Instant::now());
        sync.set_alarm(24, 0, true);
    }

    #[test]
    fn tick_extrapolates_from_anchor() {
        let start = Instant::now();
        let mut sync = ClockSync::new(start);
        sync.anchor("10:15:50", start);
        assert_eq!(sync.tick(start + Duration::from_secs(15)), "10:16:05");
        assert_eq!(sync.tick(start + Duration::from_millis(999)), "10:15:50");
    }

    #[test]
    fn tick_wraps_at_midnight() {
        let start = Instant::now();
        let mut sync = ClockSync::new(start);
        sync.anchor("23:59:58", start);
        assert_eq!(sync.tick(start + Duration::from_secs(3)), "00:00:01");
    }

    #[test]
    fn malformed_anchor_defaults_to_midnight() {
        let now = Instant::now();
        let mut sync = ClockSync::new(now);
        for input in ["bad", "1:2", "1:2:3:4", "aa:bb:cc", "25:00:00", ""] {
            sync.anchor("09:00:00", now);
            sync.anchor(input, now);
            assert_eq!(sync.tick(now), "00:00:00", "input {input:?}");
        }
    }

    #[test]
    fn try_parse_reports_reason() {
        assert_eq!(
            try_parse_device_time("1:2"),
            Err(TimeParseError::ComponentCount(2))
        );
        assert_eq!(
            try_parse_device_time("1:x:3"),
            Err(TimeParseError::NotNumeric("x".to_string()))
        );
        assert!(matches!(
            try_parse_device_time("10:60:00"),
            Err(TimeParseError::OutOfRange { .. })
        ));
        assert_eq!(
            try_parse_device_time(" 08:09:10 "),
            Ok(NaiveTime::from_hms_opt(8, 9, 10).expect("valid"))
        );
    }

    #[test]
    fn format_round_trip_restores_first_rendering() {
        let now = Instant::now();
        let mut sync = ClockSync::new(now);
        sync.anchor("18:04:33", now);
        let first = sync.set_format(DisplayFormat::Hour24, now);
        let twelve = sync.set_format(DisplayFormat::Hour12, now);
        assert_eq!(twelve.clock, "06:04:33 PM");
        let restored = sync.set_format(DisplayFormat::Hour24, now);
        assert_eq!(restored, first);
        assert_eq!(restored.clock, "18:04:33");
    }

    #[test]
    fn set_format_rerenders_alarm_immediately() {
        let now = Instant::now();
        let mut sync = ClockSync::new(now);
        sync.set_alarm(0, 15, true);
        assert_eq!(sync.format_alarm(), "00:15");
        let display = sync.set_format(DisplayFormat::Hour12, now);
        assert_eq!(display.alarm, "12:15 AM");
        assert_eq!(sync.format_alarm(), "12:15 AM");
    }

    #[test]
    fn twelve_hour_clock_table() {
        let now = Instant::now();
        let mut sync = ClockSync::new(now);
        sync.set_format(DisplayFormat::Hour12, now);
        for (input, expected) in [
            ("00:10:00", "12:10:00 AM"),
            ("12:10:00", "12:10:00 PM"),
            ("13:10:00", "01:10:00 PM"),
            ("23:10:00", "11:10:00 PM"),
        ] {
            sync.anchor(input, now);
            assert_eq!(sync.tick(now), expected);
        }
    }

    #[test]
    fn tick_never_moves_the_anchor() {
        let start = Instant::now();
        let mut sync = ClockSync::new(start);
        sync.anchor("05:00:00", start);
        let _ = sync.tick(start + Duration::from_secs(100));
        assert_eq!(
            sync.current_anchor().device_time,
            NaiveTime::from_hms_opt(5, 0, 0).expect("valid")
        );
        assert_eq!(sync.current_anchor().observed_at, start);
    }

    #[test]
    fn now_before_anchor_reads_as_anchor() {
        let start = Instant::now();
        let later = start + Duration::from_secs(10);
        let mut sync = ClockSync::new(start);
        sync.anchor("05:00:00", later);
        assert_eq!(sync.tick(start), "05:00:00");
    }
}
