mod clock;
mod config;
mod device;
mod diagnostics;
mod panel;
mod ui;

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use crate::clock::alarm::{AlarmRequest, Meridiem, TimeRequest};
use crate::clock::format::DisplayFormat;
use crate::config::{ConfigOverrides, PanelConfig, resolve_config};
use crate::device::http::HttpDevice;
use crate::device::sim::SimulatedDevice;
use crate::device::{DeviceApi, FormatRequestStyle, RadioCommand, ViewId};
use crate::diagnostics::DiagnosticsOptions;
use crate::panel::controller::Controller;
use crate::panel::service::SyncService;
use crate::panel::{PanelState, PanelView};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFormatRequest {
    Bare,
    Explicit,
    Toggle,
}

impl From<CliFormatRequest> for FormatRequestStyle {
    fn from(value: CliFormatRequest) -> Self {
        match value {
            CliFormatRequest::Bare => FormatRequestStyle::Bare,
            CliFormatRequest::Explicit => FormatRequestStyle::Explicit,
            CliFormatRequest::Toggle => FormatRequestStyle::Toggle,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFormat {
    #[value(name = "12")]
    Hour12,
    #[value(name = "24")]
    Hour24,
}

impl From<CliFormat> for DisplayFormat {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::Hour12 => DisplayFormat::Hour12,
            CliFormat::Hour24 => DisplayFormat::Hour24,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRadio {
    SeekUp,
    SeekDown,
    VolumeUp,
    VolumeDown,
}

impl From<CliRadio> for RadioCommand {
    fn from(value: CliRadio) -> Self {
        match value {
            CliRadio::SeekUp => RadioCommand::SeekUp,
            CliRadio::SeekDown => RadioCommand::SeekDown,
            CliRadio::VolumeUp => RadioCommand::VolumeUp,
            CliRadio::VolumeDown => RadioCommand::VolumeDown,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pandapanel",
    version,
    about = "Control panel for a networked alarm clock with FM radio"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    device: Option<String>,

    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    #[arg(long, global = true)]
    resync_ms: Option<u64>,

    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[arg(long, global = true, value_enum)]
    format_request: Option<CliFormatRequest>,

    #[arg(long, global = true)]
    view: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Panel,
    Watch {
        #[arg(long)]
        ticks: Option<u64>,
    },
    Status,
    Diagnostics {
        #[arg(long, default_value_t = 10)]
        samples: u32,
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
    SetTime {
        #[arg(long)]
        hour: u32,
        #[arg(long)]
        minute: u32,
        #[arg(long, default_value_t = 0)]
        second: u32,
        #[arg(long)]
        meridiem: Option<Meridiem>,
    },
    SyncTime,
    Alarm {
        #[arg(long)]
        hour: u32,
        #[arg(long)]
        minute: u32,
        #[arg(long)]
        meridiem: Option<Meridiem>,
    },
    Timer {
        #[arg(long, default_value_t = 0)]
        hours: u32,
        #[arg(long)]
        minutes: u32,
    },
    AlarmOn,
    AlarmOff,
    Format {
        #[arg(value_enum)]
        format: CliFormat,
    },
    Mode {
        view: ViewId,
    },
    Radio {
        #[arg(value_enum)]
        command: CliRadio,
    },
    Simulate {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        device_url: cli.device,
        tick_ms: cli.tick_ms,
        resync_ms: cli.resync_ms,
        timeout_ms: cli.timeout_ms,
        format_request: cli.format_request.map(FormatRequestStyle::from),
        initial_view: cli.view,
    };
    match cli.command.unwrap_or(Command::Panel) {
        Command::Simulate { bind, port } => run_simulator(&bind, port),
        command => {
            let config = resolve_config(cli.config.as_deref(), overrides)?;
            run_device_command(command, config)
        }
    }
}

fn run_device_command(command: Command, config: PanelConfig) -> Result<()> {
    let device = HttpDevice::new(
        &config.device_url,
        config.request_timeout,
        config.format_request,
    )
    .context("failed to build HTTP client")?;
    info!("using device at {}", device.base_url());
    let device: Arc<dyn DeviceApi> = Arc::new(device);
    let state = Arc::new(Mutex::new(PanelState::new(
        config.initial_view,
        Instant::now(),
    )));
    let controller = Controller::new(state, Arc::clone(&device));

    match command {
        Command::Panel => ui::app::run_gui(&config, controller),
        Command::Watch { ticks } => run_watch(controller, &config, ticks),
        Command::Status => {
            controller
                .resync()
                .context("failed to fetch device settings")?;
            print_status(&controller)
        }
        Command::Diagnostics {
            samples,
            interval_ms,
        } => diagnostics::run_diagnostics(
            device.as_ref(),
            &config.device_url,
            DiagnosticsOptions {
                samples,
                interval: Duration::from_millis(interval_ms),
                slow_threshold: config.request_timeout / 2,
            },
        ),
        Command::SetTime {
            hour,
            minute,
            second,
            meridiem,
        } => {
            let request = TimeRequest::from_form(hour, minute, second, meridiem)?;
            controller.set_time(request).context("failed to set time")?;
            print_status(&controller)
        }
        Command::SyncTime => {
            controller
                .sync_to_system_time()
                .context("failed to sync time")?;
            print_status(&controller)
        }
        Command::Alarm {
            hour,
            minute,
            meridiem,
        } => {
            let request = AlarmRequest::from_form(hour, minute, meridiem)?;
            controller.set_alarm(request).context("failed to set alarm")?;
            print_status(&controller)
        }
        Command::Timer { hours, minutes } => {
            controller
                .set_timer(hours, minutes)
                .context("failed to set timer")?;
            print_status(&controller)
        }
        Command::AlarmOn => {
            controller
                .toggle_alarm(true)
                .context("failed to enable alarm")?;
            print_status(&controller)
        }
        Command::AlarmOff => {
            controller
                .toggle_alarm(false)
                .context("failed to disable alarm")?;
            print_status(&controller)
        }
        Command::Format { format } => {
            // The toggle style needs the device's current format.
            if let Err(err) = controller.resync() {
                warn!("could not read current format: {err}");
            }
            controller
                .set_format(format.into())
                .context("failed to set display format")?;
            print_status(&controller)
        }
        Command::Mode { view } => {
            controller
                .open_view(view)
                .with_context(|| format!("failed to switch to {view}"))?;
            println!("Mode: {view}");
            Ok(())
        }
        Command::Radio { command } => {
            let command = RadioCommand::from(command);
            controller
                .radio(command)
                .with_context(|| format!("radio {} failed", command.label()))?;
            print_status(&controller)
        }
        Command::Simulate { bind, port } => run_simulator(&bind, port),
    }
}

fn run_watch(controller: Controller, config: &PanelConfig, ticks: Option<u64>) -> Result<()> {
    let (view_tx, view_rx) = mpsc::channel::<PanelView>();
    let mut service = SyncService::start(
        controller,
        config.sync_intervals(),
        Some(Box::new(move |view: &PanelView| {
            let _ = view_tx.send(view.clone());
        })),
    )?;

    let mut printed = 0_u64;
    for view in view_rx.iter() {
        println!("{}", watch_line(&view));
        printed += 1;
        if ticks.is_some_and(|limit| printed >= limit) {
            break;
        }
    }
    service.stop_tick();
    service.stop_resync();
    Ok(())
}

fn watch_line(view: &PanelView) -> String {
    let armed = if view.alarm_enabled { "on" } else { "off" };
    format!(
        "{} | alarm {} ({armed}) | {} | {}",
        view.clock_text, view.alarm_text, view.active_view, view.sync_status
    )
}

fn print_status(controller: &Controller) -> Result<()> {
    let now = Instant::now();
    let view = controller
        .state()
        .lock()
        .map_err(|_| anyhow::anyhow!("panel state lock poisoned"))?
        .view(now);
    println!("Time: {}", view.clock_text);
    println!(
        "Alarm: {} ({})",
        view.alarm_text,
        if view.alarm_enabled { "armed" } else { "off" }
    );
    println!("Format: {}", if view.use_24h { "24h" } else { "12h" });
    if let Some(frequency) = &view.radio_frequency_text {
        println!("Radio: {frequency} MHz");
    }
    if let Some(volume) = &view.radio_volume_text {
        println!("Volume: {volume}");
    }
    Ok(())
}

fn run_simulator(bind: &str, port: u16) -> Result<()> {
    let device = SimulatedDevice::start(bind, port)
        .with_context(|| format!("failed to start simulated device at {bind}:{port}"))?;
    let initial = device
        .state
        .lock()
        .map_err(|_| anyhow::anyhow!("simulated device state lock poisoned"))?
        .settings();
    println!("Simulated device listening on {}", device.base_url());
    println!(
        "Initial settings: {}",
        serde_json::to_string(&initial).context("failed to encode settings")?
    );
    loop {
        std::thread::park();
    }
}
