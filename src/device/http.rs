use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};

use crate::clock::alarm::{AlarmRequest, TimeRequest};
use crate::clock::format::DisplayFormat;
use crate::device::{
    DeviceApi, DeviceError, DeviceSettings, FormatRequestStyle, RadioCommand, ViewId,
};

pub struct HttpDevice {
    client: Client,
    base_url: String,
    format_style: FormatRequestStyle,
}

impl HttpDevice {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        format_style: FormatRequestStyle,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .no_proxy()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            format_style,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, route: &str, query: &[(&str, String)]) -> Result<Response, DeviceError> {
        let url = format!("{}{route}", self.base_url);
        debug!("GET {url} {query:?}");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|source| DeviceError::Transport {
                route: route.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status {
                route: route.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn command(&self, route: &str, query: &[(&str, String)]) -> Result<(), DeviceError> {
        self.get(route, query).map(|_| ())
    }
}

impl DeviceApi for HttpDevice {
    fn get_settings(&self) -> Result<DeviceSettings, DeviceError> {
        let route = "/get_settings";
        let body = self
            .get(route, &[])?
            .text()
            .map_err(|source| DeviceError::Transport {
                route: route.to_string(),
                source,
            })?;
        serde_json::from_str::<DeviceSettings>(&body).map_err(|err| DeviceError::Decode {
            route: route.to_string(),
            reason: err.to_string(),
        })
    }

    fn set_time(&self, request: &TimeRequest) -> Result<(), DeviceError> {
        self.command("/set_time", &request.query())
    }

    fn set_alarm(&self, request: &AlarmRequest) -> Result<(), DeviceError> {
        self.command("/set_alarm", &request.query())
    }

    fn set_alarm_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        let route = if enabled {
            "/alarm_enabled"
        } else {
            "/alarm_disabled"
        };
        self.command(route, &[])
    }

    fn set_format(&self, format: DisplayFormat, current: DisplayFormat) -> Result<(), DeviceError> {
        match self.format_style.call_for(format, current) {
            Some(call) => self.command(call.route, &call.query),
            None => Ok(()),
        }
    }

    fn set_mode(&self, view: ViewId) -> Result<(), DeviceError> {
        self.command("/set_mode", &[("mode", view.as_str().to_string())])
    }

    fn radio(&self, command: RadioCommand) -> Result<(), DeviceError> {
        self.command(command.route(), &[])
    }
}

fn normalize_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url("192.168.4.1"), "http://192.168.4.1");
        assert_eq!(
            normalize_base_url("http://192.168.4.1:8080/"),
            "http://192.168.4.1:8080"
        );
        assert_eq!(normalize_base_url(" https://clock.local "), "https://clock.local");
    }

    #[test]
    fn unreachable_device_is_a_transport_error() {
        let device = HttpDevice::new(
            "http://127.0.0.1:9",
            Duration::from_millis(300),
            FormatRequestStyle::Bare,
        )
        .expect("client builds");
        let err = device.get_settings().expect_err("nothing listens on port 9");
        assert!(matches!(err, DeviceError::Transport { .. }));
    }
}
