use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::device::{FormatRequestStyle, ViewId};
use crate::panel::service::SyncIntervals;

pub const DEFAULT_DEVICE_URL: &str = "http://192.168.4.1";

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    pub device_url: String,
    pub tick_interval: Duration,
    pub resync_interval: Duration,
    pub request_timeout: Duration,
    pub format_request: FormatRequestStyle,
    pub initial_view: ViewId,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            device_url: DEFAULT_DEVICE_URL.to_string(),
            tick_interval: Duration::from_millis(default_tick_interval_ms()),
            resync_interval: Duration::from_millis(default_resync_interval_ms()),
            request_timeout: Duration::from_millis(default_request_timeout_ms()),
            format_request: FormatRequestStyle::default(),
            initial_view: ViewId::Time,
        }
    }
}

impl PanelConfig {
    pub fn sync_intervals(&self) -> SyncIntervals {
        SyncIntervals {
            tick: self.tick_interval,
            resync: self.resync_interval,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub device_url: Option<String>,
    pub tick_ms: Option<u64>,
    pub resync_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub format_request: Option<FormatRequestStyle>,
    pub initial_view: Option<String>,
}

pub fn resolve_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<PanelConfig> {
    let mut config = match path {
        Some(path) => load_panel_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PanelConfig::default(),
    };

    if let Some(url) = overrides.device_url {
        config.device_url = url;
    }
    if let Some(ms) = overrides.tick_ms {
        config.tick_interval = Duration::from_millis(positive_ms("--tick-ms", ms)?);
    }
    if let Some(ms) = overrides.resync_ms {
        config.resync_interval = Duration::from_millis(positive_ms("--resync-ms", ms)?);
    }
    if let Some(ms) = overrides.timeout_ms {
        config.request_timeout = Duration::from_millis(positive_ms("--timeout-ms", ms)?);
    }
    if let Some(style) = overrides.format_request {
        config.format_request = style;
    }
    if let Some(view) = overrides.initial_view {
        config.initial_view = parse_view(&view)?;
    }
    Ok(config)
}

pub fn load_panel_config(path: &Path) -> Result<PanelConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_panel_config_text(&content)
}

pub fn parse_panel_config_text(content: &str) -> Result<PanelConfig> {
    let raw = serde_json::from_str::<PanelConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported panel config version {}; expected version 1",
            raw.version
        );
    }
    if raw.device_url.trim().is_empty() {
        bail!("device_url must not be empty");
    }

    Ok(PanelConfig {
        device_url: raw.device_url,
        tick_interval: Duration::from_millis(positive_ms("tick_interval_ms", raw.tick_interval_ms)?),
        resync_interval: Duration::from_millis(positive_ms(
            "resync_interval_ms",
            raw.resync_interval_ms,
        )?),
        request_timeout: Duration::from_millis(positive_ms(
            "request_timeout_ms",
            raw.request_timeout_ms,
        )?),
        format_request: raw.format_request,
        initial_view: parse_view(&raw.initial_view)?,
    })
}

fn positive_ms(field: &str, value: u64) -> Result<u64> {
    if value == 0 {
        bail!("{field} must be greater than zero");
    }
    Ok(value)
}

fn parse_view(input: &str) -> Result<ViewId> {
    ViewId::from_fragment(input).ok_or_else(|| {
        anyhow!("unknown initial view '{input}', expected TIME, ALARM or RADIO")
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PanelConfigFile {
    version: u32,
    #[serde(default = "default_device_url")]
    device_url: String,
    #[serde(default = "default_tick_interval_ms")]
    tick_interval_ms: u64,
    #[serde(default = "default_resync_interval_ms")]
    resync_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
    #[serde(default)]
    format_request: FormatRequestStyle,
    #[serde(default = "default_initial_view")]
    initial_view: String,
}

fn default_device_url() -> String {
    DEFAULT_DEVICE_URL.to_string()
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_resync_interval_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

fn default_initial_view() -> String {
    "TIME".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_fields_take_defaults() {
        let config = parse_panel_config_text(r#"{ "version": 1 }"#).expect("config");
        assert_eq!(config, PanelConfig::default());
        assert_eq!(config.sync_intervals().resync, Duration::from_secs(5));
    }

    #[test]
    fn full_file_is_parsed() {
        let config = parse_panel_config_text(
            r##"{
  "version": 1,
  "device_url": "http://10.0.0.7",
  "tick_interval_ms": 500,
  "resync_interval_ms": 10000,
  "request_timeout_ms": 750,
  "format_request": "toggle",
  "initial_view": "#RADIO"
}"##,
        )
        .expect("config");
        assert_eq!(config.device_url, "http://10.0.0.7");
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.resync_interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_millis(750));
        assert_eq!(config.format_request, FormatRequestStyle::Toggle);
        assert_eq!(config.initial_view, ViewId::Radio);
    }

    #[test]
    fn malformed_json_reports_position() {
        let err = parse_panel_config_text("{ \"version\": ").expect_err("invalid");
        assert!(err.to_string().contains("invalid JSON at line 1"));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = parse_panel_config_text(r#"{ "version": 2 }"#).expect_err("version");
        assert!(err.to_string().contains("unsupported panel config version 2"));
    }

    #[test]
    fn zero_intervals_and_bad_views_are_rejected() {
        assert!(parse_panel_config_text(r#"{ "version": 1, "tick_interval_ms": 0 }"#).is_err());
        assert!(parse_panel_config_text(r#"{ "version": 1, "initial_view": "CLOCK" }"#).is_err());
    }

    #[test]
    fn cli_overrides_win_over_file_values() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("panel.json");
        fs::write(
            &path,
            r#"{ "version": 1, "device_url": "http://10.0.0.7", "resync_interval_ms": 9000 }"#,
        )
        .expect("write config");

        let config = resolve_config(
            Some(&path),
            ConfigOverrides {
                device_url: Some("http://127.0.0.1:8080".to_string()),
                tick_ms: Some(250),
                initial_view: Some("alarm".to_string()),
                ..ConfigOverrides::default()
            },
        )
        .expect("config");
        assert_eq!(config.device_url, "http://127.0.0.1:8080");
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.resync_interval, Duration::from_secs(9));
        assert_eq!(config.initial_view, ViewId::Alarm);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        let err = resolve_config(Some(&path), ConfigOverrides::default()).expect_err("missing");
        assert!(format!("{err:#}").contains("absent.json"));
    }
}
