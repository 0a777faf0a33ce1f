use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Local;
use log::{error, info, warn};
use thiserror::Error;

use crate::clock::alarm::{AlarmRequest, AlarmState, FormError, TimeRequest, timer_target};
use crate::clock::format::DisplayFormat;
use crate::device::{DeviceApi, DeviceError, RadioCommand, ViewId};
use crate::panel::PanelState;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("invalid form input: {0}")]
    Form(#[from] FormError),
    #[error("timer duration must be at least one minute")]
    EmptyTimer,
    #[error("panel state lock poisoned")]
    StateLock,
}

#[derive(Clone)]
pub struct Controller {
    state: Arc<Mutex<PanelState>>,
    device: Arc<dyn DeviceApi>,
}

impl Controller {
    pub fn new(state: Arc<Mutex<PanelState>>, device: Arc<dyn DeviceApi>) -> Self {
        Self { state, device }
    }

    pub fn state(&self) -> &Arc<Mutex<PanelState>> {
        &self.state
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> Result<R, ActionError> {
        let mut guard = self.state.lock().map_err(|_| ActionError::StateLock)?;
        Ok(f(&mut guard))
    }

    pub fn resync(&self) -> Result<(), ActionError> {
        let fetched_at_epoch = self.with_state(|state| state.epoch())?;
        match self.device.get_settings() {
            Ok(settings) => {
                let observed_at = Instant::now();
                self.with_state(|state| {
                    state.apply_fetched_settings(fetched_at_epoch, &settings, observed_at);
                })
            }
            Err(err) => {
                self.with_state(PanelState::record_resync_failure)?;
                Err(err.into())
            }
        }
    }

    fn refresh_after_action(&self, action: &str) {
        if let Err(err) = self.resync() {
            warn!("{action} succeeded but refreshing settings failed: {err}");
        }
    }

    pub fn open_view(&self, view: ViewId) -> Result<(), ActionError> {
        self.with_state(|state| state.set_view(view))?;
        logged("switching mode", self.device.set_mode(view))?;
        info!("mode switched to {view}");
        Ok(())
    }

    pub fn toggle_alarm(&self, enabled: bool) -> Result<(), ActionError> {
        logged("toggling alarm", self.device.set_alarm_enabled(enabled))?;
        self.with_state(|state| state.set_alarm_enabled(enabled))?;
        self.refresh_after_action("alarm toggle");
        Ok(())
    }

    pub fn set_format(&self, format: DisplayFormat) -> Result<(), ActionError> {
        let current = self.with_state(|state| state.clock().format())?;
        logged("setting format", self.device.set_format(format, current))?;
        self.with_state(|state| state.set_format(format, Instant::now()))?;
        self.refresh_after_action("format change");
        Ok(())
    }

    pub fn set_time(&self, request: TimeRequest) -> Result<(), ActionError> {
        logged("setting time", self.device.set_time(&request))?;
        if let Some(time) = request.as_naive_time() {
            self.with_state(|state| state.anchor_time(time, Instant::now()))?;
        }
        info!(
            "device time set to {:02}:{:02}:{:02}",
            request.hour, request.minute, request.second
        );
        self.refresh_after_action("time set");
        Ok(())
    }

    pub fn sync_to_system_time(&self) -> Result<(), ActionError> {
        self.set_time(TimeRequest::from_time(Local::now().time()))
    }

    pub fn set_alarm(&self, request: AlarmRequest) -> Result<(), ActionError> {
        logged("setting alarm", self.device.set_alarm(&request))?;
        logged("enabling alarm", self.device.set_alarm_enabled(true))?;
        self.with_state(|state| {
            state.set_alarm(
                AlarmState {
                    hour: request.hour,
                    minute: request.minute,
                    enabled: true,
                },
                Instant::now(),
            )
        })?;
        info!(
            "{} set for {:02}:{:02}",
            request.mode.as_query_value(),
            request.hour,
            request.minute
        );
        self.refresh_after_action("alarm set");
        Ok(())
    }

    /// Counts from the device's own clock, freshly fetched, not the host's.
    pub fn set_timer(&self, hours: u32, minutes: u32) -> Result<(), ActionError> {
        if u64::from(hours) * 60 + u64::from(minutes) < 1 {
            return Err(ActionError::EmptyTimer);
        }
        if let Err(err) = self.resync() {
            error!("fetching device time for timer failed: {err}");
            return Err(err);
        }
        let anchored = self.with_state(|state| state.clock().current_anchor().device_time)?;
        let request = timer_target(anchored, hours, minutes).ok_or(ActionError::EmptyTimer)?;
        self.set_alarm(request)
    }

    pub fn radio(&self, command: RadioCommand) -> Result<(), ActionError> {
        logged("radio control", self.device.radio(command))?;
        self.refresh_after_action("radio control");
        Ok(())
    }
}

fn logged<T>(action: &str, result: Result<T, DeviceError>) -> Result<T, ActionError> {
    result.map_err(|err| {
        error!("{action} failed: {err}");
        ActionError::Device(err)
    })
}
