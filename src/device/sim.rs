//! In-process stand-in for the clock device. Serves the same GET routes as the
//! firmware so the panel can be exercised without hardware.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{Local, NaiveTime, Timelike};
use log::{debug, info, warn};
use serde::Serialize;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::clock::alarm::{Meridiem, hour_24_from_form};
use crate::device::{DeviceSettings, ViewId};

pub const VOLUME_MAX: u8 = 4;
pub const FREQUENCY_MIN_MHZ: f64 = 87.5;
pub const FREQUENCY_MAX_MHZ: f64 = 108.0;
const SEEK_STEP_MHZ: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct SimulatedState {
    clock_offset_secs: i64,
    pub format_24h: bool,
    pub alarm_hour: u32,
    pub alarm_minute: u32,
    pub alarm_enabled: bool,
    pub mode: ViewId,
    pub radio_frequency: f64,
    pub radio_volume: u8,
    pub radio_muted: bool,
}

impl Default for SimulatedState {
    fn default() -> Self {
        Self {
            clock_offset_secs: 0,
            format_24h: true,
            alarm_hour: 7,
            alarm_minute: 0,
            alarm_enabled: false,
            mode: ViewId::Time,
            radio_frequency: 101.9,
            radio_volume: 0,
            radio_muted: true,
        }
    }
}

impl SimulatedState {
    pub fn device_time(&self) -> NaiveTime {
        let host = Local::now().time();
        let (time, _) =
            host.overflowing_add_signed(chrono::Duration::seconds(self.clock_offset_secs));
        time
    }

    pub fn set_device_time(&mut self, target: NaiveTime) {
        let host = Local::now().time();
        self.clock_offset_secs = i64::from(target.num_seconds_from_midnight())
            - i64::from(host.num_seconds_from_midnight());
    }

    pub fn settings(&self) -> DeviceSettings {
        let time = self.device_time();
        DeviceSettings {
            time: format!(
                "{:02}:{:02}:{:02}",
                time.hour(),
                time.minute(),
                time.second()
            ),
            format_24h: self.format_24h,
            alarm_hour: self.alarm_hour,
            alarm_minute: self.alarm_minute,
            alarm_toggle: self.alarm_enabled,
            radio_frequency: Some((self.radio_frequency * 10.0).round() / 10.0),
            radio_volume: Some(self.radio_volume),
        }
    }

    fn seek(&mut self, up: bool) {
        let step = if up { SEEK_STEP_MHZ } else { -SEEK_STEP_MHZ };
        let mut next = self.radio_frequency + step;
        if next > FREQUENCY_MAX_MHZ + f64::EPSILON {
            next = FREQUENCY_MIN_MHZ;
        } else if next < FREQUENCY_MIN_MHZ - f64::EPSILON {
            next = FREQUENCY_MAX_MHZ;
        }
        self.radio_frequency = (next * 10.0).round() / 10.0;
    }

    fn adjust_volume(&mut self, delta: i16) {
        let next = (i16::from(self.radio_volume) + delta).clamp(0, i16::from(VOLUME_MAX));
        self.radio_volume = next as u8;
    }
}

pub struct SimulatedDevice {
    pub state: Arc<Mutex<SimulatedState>>,
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
}

impl SimulatedDevice {
    pub fn start(bind_addr: &str, port: u16) -> Result<Self> {
        let bind = format!("{bind_addr}:{port}");
        let server = Server::http(&bind)
            .map_err(|err| anyhow!("failed to start simulated device on {bind}: {err}"))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("simulated device is not bound to an IP address"))?;
        let state = Arc::new(Mutex::new(SimulatedState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let state_for_thread = Arc::clone(&state);
        let stop_for_thread = Arc::clone(&stop);
        let http_join =
            thread::spawn(move || run_server_loop(server, state_for_thread, stop_for_thread));
        info!("simulated device listening on http://{addr}");
        Ok(Self {
            state,
            addr,
            stop,
            http_join: Some(http_join),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
    }
}

fn run_server_loop(server: Server, state: Arc<Mutex<SimulatedState>>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, &state),
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

enum Reply {
    Json(DeviceSettings),
    Text(StatusCode, &'static str),
    SeeOther(&'static str),
}

fn handle_request(request: tiny_http::Request, state: &Arc<Mutex<SimulatedState>>) {
    if request.method() != &Method::Get {
        let _ = send_text(request, StatusCode(405), "method not allowed");
        return;
    }

    let url = request.url().to_string();
    let (path, query) = split_path_query(&url);
    debug!("simulated device request {path} ?{query}");

    let reply = match state.lock() {
        Ok(mut guard) => route(path, query, &mut guard),
        Err(_) => Reply::Text(StatusCode(500), "internal state lock error"),
    };

    let result = match reply {
        Reply::Json(settings) => send_json(request, StatusCode(200), &settings),
        Reply::Text(status, body) => send_text(request, status, body),
        Reply::SeeOther(location) => send_see_other(request, location),
    };
    if let Err(err) = result {
        warn!("simulated device failed to answer {path}: {err:#}");
    }
}

fn route(path: &str, query: &str, state: &mut SimulatedState) -> Reply {
    match path {
        "/" => Reply::Text(StatusCode(200), "pandapanel simulated clock device"),
        "/get_settings" => Reply::Json(state.settings()),
        "/set_time" => match parse_time_query(query) {
            Some(target) => {
                state.set_device_time(target);
                info!("simulated device time set to {}", target.format("%H:%M:%S"));
                Reply::SeeOther("/#TIME")
            }
            None => Reply::Text(StatusCode(400), "invalid time parameters"),
        },
        "/set_alarm" => match parse_alarm_query(query) {
            Some((hour, minute)) => {
                state.alarm_hour = hour;
                state.alarm_minute = minute;
                state.alarm_enabled = true;
                Reply::SeeOther("/#ALARM")
            }
            None => Reply::Text(StatusCode(400), "invalid alarm parameters"),
        },
        "/alarm_enabled" => {
            state.alarm_enabled = true;
            Reply::SeeOther("/#ALARM")
        }
        "/alarm_disabled" => {
            state.alarm_enabled = false;
            Reply::SeeOther("/#ALARM")
        }
        "/toggle_format" => {
            state.format_24h = !state.format_24h;
            Reply::SeeOther("/")
        }
        "/set_format" => {
            state.format_24h = query_param(query, "format") == Some("24");
            Reply::SeeOther("/")
        }
        "/set_mode" => match query_param(query, "mode").map(ViewId::from_str) {
            Some(Ok(view)) => {
                state.mode = view;
                state.radio_muted = view != ViewId::Radio;
                Reply::Text(StatusCode(200), "")
            }
            _ => Reply::Text(StatusCode(400), "bad request"),
        },
        "/radio_seek_up" => {
            state.seek(true);
            Reply::SeeOther("/#RADIO")
        }
        "/radio_seek_down" => {
            state.seek(false);
            Reply::SeeOther("/#RADIO")
        }
        "/radio_vol_up" => {
            state.adjust_volume(1);
            Reply::SeeOther("/#RADIO")
        }
        "/radio_vol_down" => {
            state.adjust_volume(-1);
            Reply::SeeOther("/#RADIO")
        }
        _ => Reply::Text(StatusCode(404), "404 Not Found"),
    }
}

/// Hour in 24h unless `format=12` is present, in which case `am_pm` applies.
fn parse_form_hour(query: &str) -> Option<u32> {
    let hour = query_param(query, "h")?.trim().parse::<u32>().ok()?;
    if query_param(query, "format") == Some("12") {
        let meridiem = query_param(query, "am_pm")
            .unwrap_or("AM")
            .parse::<Meridiem>()
            .ok()?;
        hour_24_from_form(hour, Some(meridiem)).ok()
    } else {
        hour_24_from_form(hour, None).ok()
    }
}

fn parse_time_query(query: &str) -> Option<NaiveTime> {
    let hour = parse_form_hour(query)?;
    let minute = query_param(query, "m")?.trim().parse::<u32>().ok()?;
    let second = query_param(query, "s")?.trim().parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_alarm_query(query: &str) -> Option<(u32, u32)> {
    let hour = parse_form_hour(query)?;
    let minute = query_param(query, "m")?.trim().parse::<u32>().ok()?;
    (minute < 60).then_some((hour, minute))
}

fn send_json<T: Serialize>(request: tiny_http::Request, status: StatusCode, body: &T) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    let content_type = Header::from_str("Content-Type: application/json")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(payload)
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    let content_type = Header::from_str("Content-Type: text/plain; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_see_other(request: tiny_http::Request, location: &str) -> Result<()> {
    let header = Header::from_str(&format!("Location: {location}"))
        .map_err(|_| anyhow!("failed to build location header"))?;
    request.respond(
        Response::empty(StatusCode(303)).with_header(header),
    )?;
    Ok(())
}

fn split_path_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query.split('#').next().unwrap_or_default()),
        None => (url.split('#').next().unwrap_or_default(), ""),
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if k == key {
            return Some(v);
        }
    }
    None
}
