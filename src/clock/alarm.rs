use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AlarmState {
    pub hour: u32,
    pub minute: u32,
    pub enabled: bool,
}

impl AlarmState {
    pub fn new(hour: u32, minute: u32, enabled: bool) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self {
            hour,
            minute,
            enabled,
        })
    }
}

impl Default for AlarmState {
    fn default() -> Self {
        // Firmware boots with a 07:00 alarm, disarmed.
        Self {
            hour: 7,
            minute: 0,
            enabled: false,
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FormError {
    #[error("hour {0} is out of range for a 12-hour clock (1-12)")]
    Hour12OutOfRange(u32),
    #[error("hour {0} is out of range (0-23)")]
    HourOutOfRange(u32),
    #[error("minute {0} is out of range (0-59)")]
    MinuteOutOfRange(u32),
    #[error("second {0} is out of range (0-59)")]
    SecondOutOfRange(u32),
    #[error("invalid meridiem '{0}', expected AM or PM")]
    InvalidMeridiem(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Meridiem {
    Am,
    Pm,
}

impl FromStr for Meridiem {
    type Err = FormError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Meridiem::Am),
            "PM" => Ok(Meridiem::Pm),
            _ => Err(FormError::InvalidMeridiem(input.to_string())),
        }
    }
}

impl fmt::Display for Meridiem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meridiem::Am => f.write_str("AM"),
            Meridiem::Pm => f.write_str("PM"),
        }
    }
}

pub fn hour_24_from_form(hour: u32, meridiem: Option<Meridiem>) -> Result<u32, FormError> {
    match meridiem {
        None if hour < 24 => Ok(hour),
        None => Err(FormError::HourOutOfRange(hour)),
        Some(_) if hour == 0 || hour > 12 => Err(FormError::Hour12OutOfRange(hour)),
        Some(Meridiem::Am) => Ok(hour % 12),
        Some(Meridiem::Pm) => Ok(hour % 12 + 12),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AlarmMode {
    Alarm,
    Timer,
}

impl AlarmMode {
    pub fn as_query_value(self) -> &'static str {
        match self {
            AlarmMode::Alarm => "alarm",
            AlarmMode::Timer => "timer",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AlarmRequest {
    pub hour: u32,
    pub minute: u32,
    pub mode: AlarmMode,
}

impl AlarmRequest {
    pub fn from_form(
        hour: u32,
        minute: u32,
        meridiem: Option<Meridiem>,
    ) -> Result<Self, FormError> {
        let hour = hour_24_from_form(hour, meridiem)?;
        if minute >= 60 {
            return Err(FormError::MinuteOutOfRange(minute));
        }
        Ok(Self {
            hour,
            minute,
            mode: AlarmMode::Alarm,
        })
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("h", self.hour.to_string()),
            ("m", self.minute.to_string()),
            ("format", "24".to_string()),
            ("mode", self.mode.as_query_value().to_string()),
        ]
    }
}

/// Adds a timer duration to the anchored device time. Durations under one
/// minute produce no request.
pub fn timer_target(device_time: NaiveTime, hours: u32, minutes: u32) -> Option<AlarmRequest> {
    let total_minutes = i64::from(hours) * 60 + i64::from(minutes);
    if total_minutes < 1 {
        return None;
    }
    let (target, _wrapped_days) =
        device_time.overflowing_add_signed(chrono::Duration::minutes(total_minutes));
    Some(AlarmRequest {
        hour: target.hour(),
        minute: target.minute(),
        mode: AlarmMode::Timer,
    })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TimeRequest {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeRequest {
    pub fn from_form(
        hour: u32,
        minute: u32,
        second: u32,
        meridiem: Option<Meridiem>,
    ) -> Result<Self, FormError> {
        let hour = hour_24_from_form(hour, meridiem)?;
        if minute >= 60 {
            return Err(FormError::MinuteOutOfRange(minute));
        }
        if second >= 60 {
            return Err(FormError::SecondOutOfRange(second));
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }

    pub fn as_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("h", self.hour.to_string()),
            ("m", self.minute.to_string()),
            ("s", self.second.to_string()),
            ("format", "24".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pm_form_hour_is_sent_as_24h() {
        let request = AlarmRequest::from_form(9, 5, Some(Meridiem::Pm)).expect("valid form");
        assert_eq!(request.hour, 21);
        assert_eq!(request.minute, 5);
        assert_eq!(request.mode, AlarmMode::Alarm);
    }

    #[test]
    fn twelve_am_and_twelve_pm_map_to_midnight_and_noon() {
        assert_eq!(hour_24_from_form(12, Some(Meridiem::Am)), Ok(0));
        assert_eq!(hour_24_from_form(12, Some(Meridiem::Pm)), Ok(12));
        assert_eq!(hour_24_from_form(1, Some(Meridiem::Am)), Ok(1));
    }

    #[test]
    fn out_of_range_form_values_are_rejected() {
        assert_eq!(
            hour_24_from_form(13, Some(Meridiem::Pm)),
            Err(FormError::Hour12OutOfRange(13))
        );
        assert_eq!(
            hour_24_from_form(0, Some(Meridiem::Am)),
            Err(FormError::Hour12OutOfRange(0))
        );
        assert_eq!(hour_24_from_form(24, None), Err(FormError::HourOutOfRange(24)));
        assert_eq!(
            AlarmRequest::from_form(7, 60, None),
            Err(FormError::MinuteOutOfRange(60))
        );
        assert_eq!(
            TimeRequest::from_form(7, 0, 61, None),
            Err(FormError::SecondOutOfRange(61))
        );
    }

    #[test]
    fn meridiem_parses_case_insensitively() {
        assert_eq!("pm".parse::<Meridiem>(), Ok(Meridiem::Pm));
        assert_eq!(" AM ".parse::<Meridiem>(), Ok(Meridiem::Am));
        assert!("noon".parse::<Meridiem>().is_err());
    }

    #[test]
    fn timer_wraps_past_midnight() {
        let anchored = NaiveTime::from_hms_opt(23, 50, 0).expect("valid time");
        let request = timer_target(anchored, 0, 20).expect("timer request");
        assert_eq!((request.hour, request.minute), (0, 10));
        assert_eq!(request.mode, AlarmMode::Timer);
        let query = request.query();
        assert!(query.contains(&("h", "0".to_string())));
        assert!(query.contains(&("format", "24".to_string())));
        assert!(query.contains(&("mode", "timer".to_string())));
    }

    #[test]
    fn timer_combines_hours_and_minutes() {
        let anchored = NaiveTime::from_hms_opt(8, 45, 30).expect("valid time");
        let request = timer_target(anchored, 1, 30).expect("timer request");
        assert_eq!((request.hour, request.minute), (10, 15));
    }

    #[test]
    fn zero_length_timer_sends_nothing() {
        let anchored = NaiveTime::from_hms_opt(8, 0, 0).expect("valid time");
        assert_eq!(timer_target(anchored, 0, 0), None);
    }

    #[test]
    fn alarm_state_rejects_invalid_values() {
        assert!(AlarmState::new(24, 0, true).is_none());
        assert!(AlarmState::new(6, 60, true).is_none());
        assert_eq!(
            AlarmState::new(6, 30, true),
            Some(AlarmState {
                hour: 6,
                minute: 30,
                enabled: true
            })
        );
    }
}
