use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::panel::PanelView;
use crate::panel::controller::Controller;

/// Runs `task` immediately and then once per `period` on its own thread until
/// stopped. Stopping wakes the thread at once instead of waiting out the
/// period.
pub struct PeriodicTask {
    name: String,
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, period: Duration, mut task: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let period = period.max(Duration::from_millis(1));
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut next_run = Instant::now();
                loop {
                    task();
                    next_run += period;
                    let now = Instant::now();
                    if next_run <= now {
                        // Fell behind; skip missed slots rather than bursting.
                        next_run = now + period;
                    }
                    match stop_rx.recv_timeout(next_run.saturating_duration_since(now)) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .with_context(|| format!("failed to spawn {name} thread"))?;
        debug!("started periodic task {name} every {period:?}");
        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    pub fn is_running(&self) -> bool {
        self.join
            .as_ref()
            .map(|join| !join.is_finished())
            .unwrap_or(false)
    }

    pub fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(());
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            warn!("periodic task {} panicked", self.name);
        }
        debug!("stopped periodic task {}", self.name);
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncIntervals {
    pub tick: Duration,
    pub resync: Duration,
}

impl Default for SyncIntervals {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            resync: Duration::from_secs(5),
        }
    }
}

pub type TickObserver = Box<dyn FnMut(&PanelView) + Send>;

pub struct SyncService {
    tick: PeriodicTask,
    resync: PeriodicTask,
}

impl SyncService {
    pub fn start(
        controller: Controller,
        intervals: SyncIntervals,
        mut on_tick: Option<TickObserver>,
    ) -> Result<Self> {
        let tick_state = std::sync::Arc::clone(controller.state());
        let tick = PeriodicTask::spawn("panel-tick", intervals.tick, move || {
            let now = Instant::now();
            let view = match tick_state.lock() {
                Ok(mut guard) => {
                    guard.tick(now);
                    guard.view(now)
                }
                Err(_) => {
                    warn!("panel state lock poisoned, skipping tick");
                    return;
                }
            };
            if let Some(observer) = on_tick.as_mut() {
                observer(&view);
            }
        })?;

        let resync = PeriodicTask::spawn("panel-resync", intervals.resync, move || {
            if let Err(err) = controller.resync() {
                warn!("failed to fetch settings: {err}");
            }
        })?;

        Ok(Self { tick, resync })
    }

    pub fn stop_tick(&mut self) {
        self.tick.stop();
    }

    pub fn stop_resync(&mut self) {
        self.resync.stop();
    }

    pub fn is_ticking(&self) -> bool {
        self.tick.is_running()
    }

    pub fn is_resyncing(&self) -> bool {
        self.resync.is_running()
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.tick.stop();
        self.resync.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::device::{DeviceApi, ViewId};
    use crate::panel::PanelState;
    use crate::panel::controller::tests::FakeDevice;

    #[test]
    fn periodic_task_runs_immediately_and_stops_promptly() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut task = PeriodicTask::spawn("test-task", Duration::from_secs(3_600), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn");
        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let started = Instant::now();
        task.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!task.is_running());
    }

    #[test]
    fn periodic_task_repeats() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("test-repeat", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn");
        thread::sleep(Duration::from_millis(200));
        drop(task);
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn service_ticks_and_resyncs_independently() {
        let device = Arc::new(FakeDevice::new("08:00:00"));
        let state = Arc::new(Mutex::new(PanelState::new(ViewId::Time, Instant::now())));
        let controller = Controller::new(
            Arc::clone(&state),
            Arc::clone(&device) as Arc<dyn DeviceApi>,
        );
        let (view_tx, view_rx) = mpsc::channel::<PanelView>();
        let observer: TickObserver = Box::new(move |view| {
            let _ = view_tx.send(view.clone());
        });
        let mut service = SyncService::start(
            controller,
            SyncIntervals {
                tick: Duration::from_millis(20),
                resync: Duration::from_millis(50),
            },
            Some(observer),
        )
        .expect("service");

        let first = view_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("tick observed");
        assert!(!first.clock_text.is_empty());

        thread::sleep(Duration::from_millis(200));
        service.stop_resync();
        assert!(!service.is_resyncing());
        assert!(service.is_ticking());
        let fetches = device
            .calls()
            .iter()
            .filter(|call| call.as_str() == "get_settings")
            .count();
        assert!(fetches >= 2, "only {fetches} fetches");

        let _stale: Vec<PanelView> = view_rx.try_iter().collect();
        let latest = view_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("ticks continue after resync stops");
        assert!(latest.clock_text.starts_with("08:00"));
        drop(service);
    }
}
