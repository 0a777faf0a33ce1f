pub mod http;
pub mod sim;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::clock::alarm::{AlarmRequest, TimeRequest};
use crate::clock::format::DisplayFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub time: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub format_24h: bool,
    pub alarm_hour: u32,
    pub alarm_minute: u32,
    #[serde(deserialize_with = "flexible_bool")]
    pub alarm_toggle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_volume: Option<u8>,
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrText {
        Bool(bool),
        Text(String),
    }

    match BoolOrText::deserialize(deserializer)? {
        BoolOrText::Bool(value) => Ok(value),
        BoolOrText::Text(text) => Ok(text.trim().eq_ignore_ascii_case("true")),
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("request to {route} failed: {source}")]
    Transport {
        route: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{route} answered with status {status}")]
    Status { route: String, status: u16 },
    #[error("could not decode {route} response: {reason}")]
    Decode { route: String, reason: String },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum ViewId {
    #[default]
    Time,
    Alarm,
    Radio,
}

impl ViewId {
    pub const ALL: [ViewId; 3] = [ViewId::Time, ViewId::Alarm, ViewId::Radio];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewId::Time => "TIME",
            ViewId::Alarm => "ALARM",
            ViewId::Radio => "RADIO",
        }
    }

    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let trimmed = fragment.trim().trim_start_matches('#');
        if trimmed.is_empty() {
            return Some(ViewId::Time);
        }
        trimmed.parse().ok()
    }
}

impl FromStr for ViewId {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_uppercase().as_str() {
            "TIME" => Ok(ViewId::Time),
            "ALARM" => Ok(ViewId::Alarm),
            "RADIO" => Ok(ViewId::Radio),
            _ => Err(format!("unknown view '{input}', expected TIME, ALARM or RADIO")),
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RadioCommand {
    SeekUp,
    SeekDown,
    VolumeUp,
    VolumeDown,
}

impl RadioCommand {
    pub fn route(self) -> &'static str {
        match self {
            RadioCommand::SeekUp => "/radio_seek_up",
            RadioCommand::SeekDown => "/radio_seek_down",
            RadioCommand::VolumeUp => "/radio_vol_up",
            RadioCommand::VolumeDown => "/radio_vol_down",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RadioCommand::SeekUp => "Seek +",
            RadioCommand::SeekDown => "Seek -",
            RadioCommand::VolumeUp => "Vol +",
            RadioCommand::VolumeDown => "Vol -",
        }
    }
}

/// Firmware revisions disagree on how the format preference is sent, so the
/// call shape is configurable.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatRequestStyle {
    #[default]
    Bare,
    Explicit,
    Toggle,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FormatCall {
    pub route: &'static str,
    pub query: Vec<(&'static str, String)>,
}

impl FormatRequestStyle {
    pub fn call_for(self, requested: DisplayFormat, current: DisplayFormat) -> Option<FormatCall> {
        match (self, requested) {
            (FormatRequestStyle::Toggle, _) if requested == current => None,
            (FormatRequestStyle::Toggle, _) => Some(FormatCall {
                route: "/toggle_format",
                query: Vec::new(),
            }),
            (_, DisplayFormat::Hour24) => Some(FormatCall {
                route: "/set_format",
                query: vec![("format", "24".to_string())],
            }),
            (FormatRequestStyle::Bare, DisplayFormat::Hour12) => Some(FormatCall {
                route: "/set_format",
                query: Vec::new(),
            }),
            (FormatRequestStyle::Explicit, DisplayFormat::Hour12) => Some(FormatCall {
                route: "/set_format",
                query: vec![("format", "12".to_string())],
            }),
        }
    }
}

pub trait DeviceApi: Send + Sync {
    fn get_settings(&self) -> Result<DeviceSettings, DeviceError>;
    fn set_time(&self, request: &TimeRequest) -> Result<(), DeviceError>;
    fn set_alarm(&self, request: &AlarmRequest) -> Result<(), DeviceError>;
    fn set_alarm_enabled(&self, enabled: bool) -> Result<(), DeviceError>;
    fn set_format(&self, format: DisplayFormat, current: DisplayFormat) -> Result<(), DeviceError>;
    fn set_mode(&self, view: ViewId) -> Result<(), DeviceError>;
    fn radio(&self, command: RadioCommand) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_accept_string_booleans_and_missing_radio() {
        let json = r#"{"time":"07:30:00","format_24h":"false","alarm_hour":6,"alarm_minute":45,"alarm_toggle":"true"}"#;
        let settings = serde_json::from_str::<DeviceSettings>(json).expect("valid settings");
        assert!(!settings.format_24h);
        assert!(settings.alarm_toggle);
        assert_eq!(settings.radio_frequency, None);
        assert_eq!(settings.radio_volume, None);
    }

    #[test]
    fn settings_parse_full_payload() {
        let json = r#"{"time":"23:01:02","format_24h":true,"alarm_hour":7,"alarm_minute":0,"alarm_toggle":false,"radio_frequency":101.9,"radio_volume":2}"#;
        let settings = serde_json::from_str::<DeviceSettings>(json).expect("valid settings");
        assert!(settings.format_24h);
        assert_eq!(settings.radio_frequency, Some(101.9));
        assert_eq!(settings.radio_volume, Some(2));
    }

    #[test]
    fn view_fragment_parsing() {
        assert_eq!(ViewId::from_fragment("#ALARM"), Some(ViewId::Alarm));
        assert_eq!(ViewId::from_fragment("radio"), Some(ViewId::Radio));
        assert_eq!(ViewId::from_fragment(""), Some(ViewId::Time));
        assert_eq!(ViewId::from_fragment("#"), Some(ViewId::Time));
        assert_eq!(ViewId::from_fragment("#SETTINGS"), None);
    }

    #[test]
    fn format_call_shapes() {
        use DisplayFormat::{Hour12, Hour24};

        let bare_12 = FormatRequestStyle::Bare
            .call_for(Hour12, Hour24)
            .expect("call");
        assert_eq!(bare_12.route, "/set_format");
        assert!(bare_12.query.is_empty());

        let explicit_12 = FormatRequestStyle::Explicit
            .call_for(Hour12, Hour24)
            .expect("call");
        assert_eq!(explicit_12.query, vec![("format", "12".to_string())]);

        for style in [FormatRequestStyle::Bare, FormatRequestStyle::Explicit] {
            let call = style.call_for(Hour24, Hour12).expect("call");
            assert_eq!(call.query, vec![("format", "24".to_string())]);
        }

        assert_eq!(FormatRequestStyle::Toggle.call_for(Hour24, Hour24), None);
        assert_eq!(
            FormatRequestStyle::Toggle
                .call_for(Hour12, Hour24)
                .map(|call| call.route),
            Some("/toggle_format")
        );
    }
}
