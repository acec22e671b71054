//! Precision click-timing engine
//!
//! One background thread clicks at the configured rate until stopped or a
//! limit is reached. Deadlines advance by the (optionally jittered)
//! interval; when the loop falls behind it resynchronizes to "now" instead
//! of bursting, so a stall costs at most one late click.

use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ClickConfig;
use crate::input_simulator::InputInjector;
use crate::timer_resolution::TimerResolution;
use crate::{ClickweaveError, Result};

/// Shortest interval the loop will ever wait between clicks
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Longest interval between clicks; slower rates are clamped to this
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Progress is reported on every Nth click
pub const PROGRESS_EVERY: u64 = 10;

/// Progress report delivered from the timing thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickProgress {
    pub clicks_done: u64,
    pub elapsed_secs: f64,
    /// Clicks whose injection returned an error
    pub failures: u64,
    /// Set only on the last report of a run
    pub finished: bool,
}

/// Callback invoked on the timing thread
pub type ProgressCallback = Arc<dyn Fn(ClickProgress) + Send + Sync>;

/// Snapshot of the engine's run state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickerRunState {
    pub running: bool,
    pub clicks_done: u64,
    pub failures: u64,
    pub started_at: Option<Instant>,
}

#[derive(Default)]
struct RunCounter {
    started: u64,
    ended: u64,
}

struct RunState {
    running: AtomicBool,
    clicks_done: AtomicU64,
    failures: AtomicU64,
    started_at: Mutex<Option<Instant>>,
    runs: Mutex<RunCounter>,
    run_ended: Condvar,
}

impl RunState {
    fn end_run(&self) {
        lock(&self.runs).ended += 1;
        self.run_ended.notify_all();
    }
}

/// Stop signal and thread of the current (or last) run
struct ActiveRun {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Auto-clicker driving an [`InputInjector`] at a target cadence
pub struct ClickerEngine {
    injector: Arc<dyn InputInjector>,
    config: Mutex<ClickConfig>,
    progress: Mutex<Option<ProgressCallback>>,
    state: Arc<RunState>,
    active: Mutex<Option<ActiveRun>>,
}

impl ClickerEngine {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self {
            injector,
            config: Mutex::new(ClickConfig::default()),
            progress: Mutex::new(None),
            state: Arc::new(RunState {
                running: AtomicBool::new(false),
                clicks_done: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                started_at: Mutex::new(None),
                runs: Mutex::new(RunCounter::default()),
                run_ended: Condvar::new(),
            }),
            active: Mutex::new(None),
        }
    }

    /// Replace the configuration used by the next `start()`
    pub fn configure(&self, config: ClickConfig) -> Result<()> {
        config.validate()?;
        *lock(&self.config) = config;
        Ok(())
    }

    pub fn config(&self) -> ClickConfig {
        lock(&self.config).clone()
    }

    /// Register the progress callback used by subsequent runs
    ///
    /// The callback runs on the timing thread. There is a single slot:
    /// this replaces any earlier callback or [`subscribe`](Self::subscribe)
    /// channel.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(ClickProgress) + Send + Sync + 'static,
    {
        *lock(&self.progress) = Some(Arc::new(callback));
    }

    /// Deliver progress reports through a channel instead of a callback
    ///
    /// Shares the slot used by [`on_progress`](Self::on_progress), so it
    /// replaces any registered callback, and a later `on_progress` or
    /// `subscribe` disconnects the returned receiver.
    pub fn subscribe(&self) -> mpsc::Receiver<ClickProgress> {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        self.on_progress(move |progress| {
            // Receiver gone just means nobody is listening anymore
            let _ = lock(&tx).send(progress);
        });
        rx
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ClickerRunState {
        ClickerRunState {
            running: self.is_running(),
            clicks_done: self.state.clicks_done.load(Ordering::SeqCst),
            failures: self.state.failures.load(Ordering::SeqCst),
            started_at: *lock(&self.state.started_at),
        }
    }

    /// Start clicking; does nothing if a run is already in progress
    pub fn start(&self) -> Result<()> {
        let mut active = lock(&self.active);
        if self.is_running() {
            debug!("Clicker already running, ignoring start");
            return Ok(());
        }

        // Reap a run that ended on its own
        if let Some(finished) = active.take() {
            join_loop(finished.handle);
        }

        let config = self.config();
        let progress = lock(&self.progress).clone();
        let started_at = Instant::now();

        self.state.clicks_done.store(0, Ordering::SeqCst);
        self.state.failures.store(0, Ordering::SeqCst);
        *lock(&self.state.started_at) = Some(started_at);
        self.state.running.store(true, Ordering::SeqCst);
        lock(&self.state.runs).started += 1;

        let (stop_tx, stop_rx) = mpsc::channel();
        let timing_loop = TimingLoop {
            config,
            injector: Arc::clone(&self.injector),
            state: Arc::clone(&self.state),
            progress,
            stop_rx,
            started_at,
        };

        let handle = thread::Builder::new()
            .name("clicker".into())
            .spawn(move || timing_loop.run())
            .map_err(|e| {
                self.state.running.store(false, Ordering::SeqCst);
                ClickweaveError::Worker(format!("Failed to spawn clicker thread: {}", e))
            })?;

        *active = Some(ActiveRun { stop_tx, handle });
        Ok(())
    }

    /// Stop clicking and wait for the timing thread to exit
    ///
    /// Does nothing if no run is active. Once this returns, no further
    /// clicks will be injected.
    pub fn stop(&self) {
        let Some(run) = lock(&self.active).take() else {
            return;
        };
        if self.is_running() {
            info!("Stopping clicker");
        }
        // Fails only if the loop already exited
        let _ = run.stop_tx.send(());
        join_loop(run.handle);
    }

    /// Block until the current run ends
    ///
    /// Returns immediately if nothing is running. With no limit configured
    /// this waits until another thread calls `stop()`.
    pub fn wait(&self) {
        let mut runs = lock(&self.state.runs);
        let target = runs.started;
        while runs.ended < target {
            runs = self
                .state
                .run_ended
                .wait(runs)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

impl Drop for ClickerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_loop(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("Clicker thread panicked");
    }
}

struct TimingLoop {
    config: ClickConfig,
    injector: Arc<dyn InputInjector>,
    state: Arc<RunState>,
    progress: Option<ProgressCallback>,
    stop_rx: mpsc::Receiver<()>,
    started_at: Instant,
}

impl TimingLoop {
    fn run(self) {
        let _resolution = TimerResolution::elevate();
        let mut rng = rand::rng();
        let mut deadline = Instant::now();
        let mut clicks_done: u64 = 0;
        let mut failures: u64 = 0;

        info!(
            "Clicker started: {} Hz, {} button, jitter {}ms, limit {:?}",
            self.config.rate_hz, self.config.button, self.config.jitter_ms, self.config.limit
        );

        loop {
            match self.stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            if self
                .config
                .limit
                .is_reached(clicks_done, self.started_at.elapsed())
            {
                debug!("Click limit reached after {} clicks", clicks_done);
                break;
            }

            if let Err(e) = self.injector.inject_click(self.config.button) {
                failures += 1;
                self.state.failures.store(failures, Ordering::SeqCst);
                warn!("Click injection failed: {}", e);
            }
            clicks_done += 1;
            self.state.clicks_done.store(clicks_done, Ordering::SeqCst);

            if clicks_done % PROGRESS_EVERY == 0 {
                self.report(clicks_done, failures, false);
            }

            let interval = next_interval(&self.config, &mut rng);
            let now = Instant::now();
            deadline = deadline.checked_add(interval).unwrap_or(now).max(now);

            let wait = deadline - now;
            if !wait.is_zero() {
                match self.stop_rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
        }
        // Final report comes from Drop, after the timer resolution is restored
    }

    fn report(&self, clicks_done: u64, failures: u64, finished: bool) {
        if let Some(callback) = &self.progress {
            callback(ClickProgress {
                clicks_done,
                elapsed_secs: self.started_at.elapsed().as_secs_f64(),
                failures,
                finished,
            });
        }
    }
}

impl Drop for TimingLoop {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        let clicks_done = self.state.clicks_done.load(Ordering::SeqCst);
        let failures = self.state.failures.load(Ordering::SeqCst);
        if thread::panicking() {
            warn!("Clicker loop panicked after {} clicks", clicks_done);
        }
        self.report(clicks_done, failures, true);

        info!(
            "Clicker stopped: {} clicks in {:.2}s ({} failed)",
            clicks_done,
            self.started_at.elapsed().as_secs_f64(),
            failures
        );
        self.state.end_run();
    }
}

/// Interval until the next click: base period plus uniform jitter, clamped
/// to `MIN_INTERVAL..=MAX_INTERVAL`
fn next_interval(config: &ClickConfig, rng: &mut impl Rng) -> Duration {
    let mut secs = 1.0 / config.rate_hz;
    if config.jitter_ms > 0.0 {
        let jitter = config.jitter_ms / 1000.0;
        secs += rng.random_range(-jitter..=jitter);
    }
    if secs <= MIN_INTERVAL.as_secs_f64() {
        MIN_INTERVAL
    } else {
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_INTERVAL)
            .min(MAX_INTERVAL)
    }
}
