use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use eframe::egui::{self, Color32, RichText, TopBottomPanel, Ui};
use log::warn;

use crate::clock::alarm::{AlarmRequest, Meridiem, TimeRequest};
use crate::clock::format::DisplayFormat;
use crate::config::PanelConfig;
use crate::device::{RadioCommand, ViewId};
use crate::panel::PanelView;
use crate::panel::controller::{ActionError, Controller};
use crate::panel::service::{SyncIntervals, SyncService};

const STATUS_OK_TTL: Duration = Duration::from_secs(3);
const STATUS_ERR_TTL: Duration = Duration::from_secs(5);

pub fn run_gui(config: &PanelConfig, controller: Controller) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("PandaPanel")
            .with_inner_size([720.0, 520.0])
            .with_min_inner_size([560.0, 420.0]),
        ..Default::default()
    };

    let intervals = config.sync_intervals();
    let device_url = config.device_url.clone();
    eframe::run_native(
        "PandaPanel",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            let app = PandaPanelApp::start(cc.egui_ctx.clone(), controller, intervals, device_url)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow!("failed to launch PandaPanel GUI: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(Color32::from_rgb(226, 234, 246));
    visuals.panel_fill = Color32::from_rgb(8, 16, 26);
    visuals.window_fill = Color32::from_rgb(12, 20, 32);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(16, 24, 38);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(26, 42, 62);
    visuals.widgets.active.bg_fill = Color32::from_rgb(34, 60, 88);
    visuals.selection.bg_fill = Color32::from_rgb(43, 148, 178);
    ctx.set_visuals(visuals);
}

struct ActionOutcome {
    label: &'static str,
    result: Result<(), String>,
}

struct TimeForm {
    hour: u32,
    minute: u32,
    second: u32,
    pm: bool,
}

struct AlarmForm {
    hour: u32,
    minute: u32,
    pm: bool,
}

struct TimerForm {
    hours: u32,
    minutes: u32,
}

struct PandaPanelApp {
    controller: Controller,
    device_url: String,
    tick: Duration,
    service: SyncService,
    outcome_tx: Sender<ActionOutcome>,
    outcome_rx: Receiver<ActionOutcome>,
    in_flight: usize,
    status_message: Option<(String, Instant, bool)>,
    time_form: TimeForm,
    alarm_form: AlarmForm,
    timer_form: TimerForm,
}

impl PandaPanelApp {
    fn start(
        ctx: egui::Context,
        controller: Controller,
        intervals: SyncIntervals,
        device_url: String,
    ) -> Result<Self> {
        let repaint_ctx = ctx.clone();
        let service = SyncService::start(
            controller.clone(),
            intervals,
            Some(Box::new(move |_view: &PanelView| repaint_ctx.request_repaint())),
        )?;
        let (outcome_tx, outcome_rx) = mpsc::channel();
        Ok(Self {
            controller,
            device_url,
            tick: intervals.tick,
            service,
            outcome_tx,
            outcome_rx,
            in_flight: 0,
            status_message: None,
            time_form: TimeForm {
                hour: 12,
                minute: 0,
                second: 0,
                pm: false,
            },
            alarm_form: AlarmForm {
                hour: 7,
                minute: 0,
                pm: false,
            },
            timer_form: TimerForm {
                hours: 0,
                minutes: 10,
            },
        })
    }

    fn set_status(&mut self, text: impl Into<String>, ttl: Duration, is_error: bool) {
        self.status_message = Some((text.into(), Instant::now() + ttl, is_error));
    }

    fn dispatch<F>(&mut self, ctx: &egui::Context, label: &'static str, action: F)
    where
        F: FnOnce(&Controller) -> Result<(), ActionError> + Send + 'static,
    {
        let controller = self.controller.clone();
        let tx = self.outcome_tx.clone();
        let repaint_ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name(format!("panel-action-{label}"))
            .spawn(move || {
                let result = action(&controller).map_err(|err| err.to_string());
                let _ = tx.send(ActionOutcome { label, result });
                repaint_ctx.request_repaint();
            });
        match spawned {
            Ok(_) => self.in_flight += 1,
            Err(err) => {
                warn!("could not start {label} worker: {err}");
                self.set_status(format!("{label} failed: {err}"), STATUS_ERR_TTL, true);
            }
        }
    }

    fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            match outcome.result {
                Ok(()) => self.set_status(format!("{} done", outcome.label), STATUS_OK_TTL, false),
                Err(err) => {
                    self.set_status(format!("{} failed: {err}", outcome.label), STATUS_ERR_TTL, true)
                }
            }
        }
    }

    fn current_view(&self) -> Option<PanelView> {
        self.controller
            .state()
            .lock()
            .ok()
            .map(|state| state.view(Instant::now()))
    }

    fn show_header(&mut self, ui: &mut Ui, view: &PanelView) {
        ui.horizontal_wrapped(|ui| {
            ui.label(
                RichText::new("PandaPanel")
                    .size(24.0)
                    .color(Color32::from_rgb(96, 228, 206))
                    .strong(),
            );
            ui.separator();
            ui.label(
                RichText::new(&view.clock_text)
                    .size(30.0)
                    .color(Color32::from_rgb(255, 214, 117))
                    .monospace()
                    .strong(),
            );
            ui.separator();
            let format_label = if view.use_24h {
                "Switch to 12h"
            } else {
                "Switch to 24h"
            };
            if ui.button(format_label).clicked() {
                let target = DisplayFormat::from_24h_flag(view.use_24h).toggled();
                self.dispatch(ui.ctx(), "format change", move |controller| {
                    controller.set_format(target)
                });
            }
        });

        ui.horizontal(|ui| {
            for tab in ViewId::ALL {
                if ui
                    .selectable_label(view.active_view == tab, RichText::new(tab.as_str()).strong())
                    .clicked()
                    && view.active_view != tab
                {
                    self.dispatch(ui.ctx(), "mode switch", move |controller| {
                        controller.open_view(tab)
                    });
                }
            }
        });
    }

    fn show_time_view(&mut self, ui: &mut Ui, view: &PanelView) {
        ui.label(
            RichText::new("Set Device Time")
                .size(18.0)
                .color(Color32::from_rgb(104, 221, 205))
                .strong(),
        );
        ui.horizontal(|ui| {
            hour_input(ui, &mut self.time_form.hour, view.use_24h);
            ui.label(":");
            ui.add(egui::DragValue::new(&mut self.time_form.minute).range(0..=59));
            ui.label(":");
            ui.add(egui::DragValue::new(&mut self.time_form.second).range(0..=59));
            if !view.use_24h {
                meridiem_input(ui, &mut self.time_form.pm);
            }
        });
        ui.horizontal(|ui| {
            if ui
                .add(
                    egui::Button::new(RichText::new("Set Time").strong())
                        .fill(Color32::from_rgb(22, 78, 89)),
                )
                .clicked()
            {
                match TimeRequest::from_form(
                    self.time_form.hour,
                    self.time_form.minute,
                    self.time_form.second,
                    form_meridiem(view.use_24h, self.time_form.pm),
                ) {
                    Ok(request) => self.dispatch(ui.ctx(), "time set", move |controller| {
                        controller.set_time(request)
                    }),
                    Err(err) => self.set_status(err.to_string(), STATUS_ERR_TTL, true),
                }
            }
            if ui.button("Sync to System Time").clicked() {
                self.dispatch(ui.ctx(), "time sync", Controller::sync_to_system_time);
            }
        });
    }

    fn show_alarm_view(&mut self, ui: &mut Ui, view: &PanelView) {
        ui.horizontal(|ui| {
            ui.label(
                RichText::new(format!("Alarm {}", view.alarm_text))
                    .size(22.0)
                    .color(Color32::from_rgb(255, 190, 106))
                    .strong(),
            );
            let (armed_text, armed_color) = if view.alarm_enabled {
                ("ARMED", Color32::from_rgb(108, 228, 138))
            } else {
                ("OFF", Color32::from_rgb(146, 160, 177))
            };
            ui.label(RichText::new(armed_text).color(armed_color).strong());
            if view.alarm_toggle_visible {
                let mut enabled = view.alarm_enabled;
                if ui.checkbox(&mut enabled, "Enabled").changed() {
                    self.dispatch(ui.ctx(), "alarm toggle", move |controller| {
                        controller.toggle_alarm(enabled)
                    });
                }
            }
        });

        ui.separator();
        ui.label(RichText::new("Set Alarm").strong());
        ui.horizontal(|ui| {
            hour_input(ui, &mut self.alarm_form.hour, view.use_24h);
            ui.label(":");
            ui.add(egui::DragValue::new(&mut self.alarm_form.minute).range(0..=59));
            if !view.use_24h {
                meridiem_input(ui, &mut self.alarm_form.pm);
            }
            if ui
                .add(
                    egui::Button::new(RichText::new("Set Alarm").strong())
                        .fill(Color32::from_rgb(34, 64, 108)),
                )
                .clicked()
            {
                match AlarmRequest::from_form(
                    self.alarm_form.hour,
                    self.alarm_form.minute,
                    form_meridiem(view.use_24h, self.alarm_form.pm),
                ) {
                    Ok(request) => self.dispatch(ui.ctx(), "alarm set", move |controller| {
                        controller.set_alarm(request)
                    }),
                    Err(err) => self.set_status(err.to_string(), STATUS_ERR_TTL, true),
                }
            }
        });

        ui.separator();
        ui.label(RichText::new("Start Timer").strong());
        ui.horizontal(|ui| {
            ui.add(egui::DragValue::new(&mut self.timer_form.hours).range(0..=23));
            ui.label("h");
            ui.add(egui::DragValue::new(&mut self.timer_form.minutes).range(0..=59));
            ui.label("min");
            if ui
                .add(
                    egui::Button::new(RichText::new("Start").strong())
                        .fill(Color32::from_rgb(28, 82, 67)),
                )
                .clicked()
            {
                let (hours, minutes) = (self.timer_form.hours, self.timer_form.minutes);
                self.dispatch(ui.ctx(), "timer", move |controller| {
                    controller.set_timer(hours, minutes)
                });
            }
        });
    }

    fn show_radio_view(&mut self, ui: &mut Ui, view: &PanelView) {
        ui.label(
            RichText::new(format!(
                "{} MHz",
                view.radio_frequency_text.as_deref().unwrap_or("--.-")
            ))
            .size(28.0)
            .color(Color32::from_rgb(114, 220, 205))
            .monospace()
            .strong(),
        );
        ui.label(
            RichText::new(format!(
                "Volume {}",
                view.radio_volume_text.as_deref().unwrap_or("-")
            ))
            .color(Color32::from_rgb(169, 188, 209)),
        );
        ui.horizontal(|ui| {
            for command in [
                RadioCommand::SeekDown,
                RadioCommand::SeekUp,
                RadioCommand::VolumeDown,
                RadioCommand::VolumeUp,
            ] {
                if ui.button(command.label()).clicked() {
                    self.dispatch(ui.ctx(), "radio control", move |controller| {
                        controller.radio(command)
                    });
                }
            }
        });
    }
}

impl eframe::App for PandaPanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some((_, expires_at, _)) = &self.status_message
            && Instant::now() >= *expires_at
        {
            self.status_message = None;
        }
        self.drain_outcomes();

        let Some(view) = self.current_view() else {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.label(
                    RichText::new("Panel state is unavailable; restart the panel.")
                        .color(Color32::from_rgb(255, 124, 124)),
                );
            });
            return;
        };

        TopBottomPanel::top("header")
            .resizable(false)
            .show(ctx, |ui| self.show_header(ui, &view));

        TopBottomPanel::bottom("footer")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.label(
                        RichText::new(format!("Device {}", self.device_url))
                            .color(Color32::from_rgb(120, 205, 192)),
                    );
                    ui.separator();
                    ui.label(
                        RichText::new(&view.sync_status).color(Color32::from_rgb(161, 180, 201)),
                    );
                    if !self.service.is_ticking() || !self.service.is_resyncing() {
                        ui.separator();
                        ui.label(
                            RichText::new("background sync stopped")
                                .color(Color32::from_rgb(255, 183, 95)),
                        );
                    }
                    if self.in_flight > 0 {
                        ui.separator();
                        ui.spinner();
                    }
                    if let Some((text, _, is_error)) = &self.status_message {
                        ui.separator();
                        let color = if *is_error {
                            Color32::from_rgb(255, 124, 124)
                        } else {
                            Color32::from_rgb(111, 228, 134)
                        };
                        ui.label(RichText::new(text).color(color));
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| match view.active_view {
            ViewId::Time => self.show_time_view(ui, &view),
            ViewId::Alarm => self.show_alarm_view(ui, &view),
            ViewId::Radio => self.show_radio_view(ui, &view),
        });

        ctx.request_repaint_after(self.tick);
    }
}

fn hour_input(ui: &mut Ui, hour: &mut u32, use_24h: bool) {
    let range = if use_24h { 0..=23 } else { 1..=12 };
    *hour = (*hour).clamp(*range.start(), *range.end());
    ui.add(egui::DragValue::new(hour).range(range));
}

fn meridiem_input(ui: &mut Ui, pm: &mut bool) {
    ui.radio_value(pm, false, "AM");
    ui.radio_value(pm, true, "PM");
}

/// Forms only carry a meridiem while the panel shows 12-hour time.
fn form_meridiem(use_24h: bool, pm: bool) -> Option<Meridiem> {
    match (use_24h, pm) {
        (true, _) => None,
        (false, false) => Some(Meridiem::Am),
        (false, true) => Some(Meridiem::Pm),
    }
}
